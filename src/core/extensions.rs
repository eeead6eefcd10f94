// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Built-in extension modules.
//!
//! An extension installs constants and generator functions into the
//! symbol table before the first pass. Generator functions are plain
//! host functions returning assembly text; source code reaches them
//! through `@name(args)` statements, never the other way around.

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::eval::{EvalError, NativeFn, NativeImpl, Value};

pub struct Extension {
    pub name: &'static str,
    install: fn(&mut HashMap<String, Value>),
}

impl Extension {
    pub fn install(&self, symbols: &mut HashMap<String, Value>) {
        (self.install)(symbols);
    }
}

/// The extensions installed by default: C64 CPU, BASIC and general
/// memory helpers.
pub fn builtin() -> &'static [Extension] {
    &[
        Extension {
            name: "cpu",
            install: install_cpu,
        },
        Extension {
            name: "basic",
            install: install_basic,
        },
        Extension {
            name: "std",
            install: install_std,
        },
    ]
}

fn register(
    symbols: &mut HashMap<String, Value>,
    name: &str,
    func: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
) {
    let func: NativeImpl = Rc::new(func);
    symbols.insert(
        name.to_string(),
        Value::Native(NativeFn {
            name: name.to_string(),
            func,
        }),
    );
}

fn int_arg(name: &str, args: &[Value], index: usize) -> Result<i64, EvalError> {
    match args.get(index) {
        Some(Value::Int(v)) => Ok(*v),
        _ => Err(EvalError::new(format!(
            "{name}() expects an integer argument"
        ))),
    }
}

fn str_arg(name: &str, args: &[Value], index: usize) -> Result<String, EvalError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(EvalError::new(format!("{name}() expects a text argument"))),
    }
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() != n {
        return Err(EvalError::new(format!(
            "{name}() takes {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

/// Register pairs, `lda #lo / ldx #hi` and friends.
fn load_pair(
    low: &'static str,
    high: &'static str,
) -> impl Fn(&[Value]) -> Result<Value, EvalError> {
    move |args| {
        arity(low, args, 1)?;
        let value = int_arg(low, args, 0)?;
        Ok(Value::Str(format!(
            "\n{low} #lo({value})\n{high} #hi({value})\n"
        )))
    }
}

fn store_pair(
    low: &'static str,
    high: &'static str,
) -> impl Fn(&[Value]) -> Result<Value, EvalError> {
    move |args| {
        arity(low, args, 1)?;
        let address = int_arg(low, args, 0)?;
        Ok(Value::Str(format!(
            "\n{low} {address}\n{high} {}\n",
            address + 1
        )))
    }
}

fn install_cpu(symbols: &mut HashMap<String, Value>) {
    symbols.insert("CPU_IO_DATA_DIRECTION".to_string(), Value::Int(0x00));
    symbols.insert("CPU_IO_PORT".to_string(), Value::Int(0x01));

    register(symbols, "ldax", load_pair("lda", "ldx"));
    register(symbols, "lday", load_pair("lda", "ldy"));
    register(symbols, "ldxy", load_pair("ldx", "ldy"));
    register(symbols, "stax", store_pair("sta", "stx"));
    register(symbols, "stay", store_pair("sta", "sty"));
    register(symbols, "stxy", store_pair("stx", "sty"));
}

fn install_std(symbols: &mut HashMap<String, Value>) {
    symbols.insert("CHAR_ROM".to_string(), Value::Int(0xd000));

    register(symbols, "setb", |args| {
        arity("setb", args, 2)?;
        let address = int_arg("setb", args, 0)?;
        match &args[1] {
            Value::Int(value) => Ok(Value::Str(format!(
                "\nlda #{value}\nsta {address}\n"
            ))),
            Value::List(items) => match items.as_slice() {
                [Value::Int(source)] => Ok(Value::Str(format!(
                    "\nlda {source}\nsta {address}\n"
                ))),
                _ => Err(EvalError::new(
                    "setb() expects a value or a one element address list",
                )),
            },
            _ => Err(EvalError::new(
                "setb() expects a value or a one element address list",
            )),
        }
    });

    register(symbols, "setw", |args| {
        arity("setw", args, 2)?;
        let address = int_arg("setw", args, 0)?;
        match &args[1] {
            Value::Int(value) => Ok(Value::Str(format!(
                "\nlda #lo({value})\nsta {address}\nlda #hi({value})\nsta {}\n",
                address + 1
            ))),
            Value::List(items) => match items.as_slice() {
                [Value::Int(source)] => Ok(Value::Str(format!(
                    "\nlda {source}\nsta {address}\nlda {}\nsta {}\n",
                    source + 1,
                    address + 1
                ))),
                _ => Err(EvalError::new(
                    "setw() expects a value or a one element address list",
                )),
            },
            _ => Err(EvalError::new(
                "setw() expects a value or a one element address list",
            )),
        }
    });
}

fn install_basic(symbols: &mut HashMap<String, Value>) {
    symbols.insert("BASIC_ROM".to_string(), Value::Int(0xa000));
    symbols.insert("BASIC_ROM_STROUT".to_string(), Value::Int(0xab1e));
    symbols.insert("BASIC_START_ADDRESS".to_string(), Value::Int(0x0801));
    symbols.insert("BASIC_TOKEN_REM".to_string(), Value::Int(0x8f));
    symbols.insert("BASIC_TOKEN_SYS".to_string(), Value::Int(0x9e));

    register(symbols, "basicStart", |args| {
        arity("basicStart", args, 0)?;
        Ok(Value::Str("\n.org BASIC_START_ADDRESS\n".to_string()))
    });

    register(symbols, "basicRem", |args| {
        arity("basicRem", args, 2)?;
        let line = int_arg("basicRem", args, 0)?;
        let text = str_arg("basicRem", args, 1)?;
        Ok(Value::Str(format!(
            "\n.word _ + 2 + 2 + 1 + {}\n\
             .word {line}\n\
             .byte BASIC_TOKEN_REM\n\
             .encoding ENCODING_PETSCII_UPPER\n\
             .text \" {text}\"\n\
             .byte 0\n",
            text.chars().count() + 1
        )))
    });

    register(symbols, "basicSys", |args| {
        arity("basicSys", args, 2)?;
        let line = int_arg("basicSys", args, 0)?;
        let address = int_arg("basicSys", args, 1)?;
        let sys_arg = format!("{address}");
        Ok(Value::Str(format!(
            "\n.word _ + 2 + 2 + 1 + {}\n\
             .word {line}\n\
             .byte BASIC_TOKEN_SYS\n\
             .encoding ENCODING_PETSCII_UPPER\n\
             .text \"{sys_arg}\"\n\
             .byte 0\n",
            sys_arg.len()
        )))
    });

    register(symbols, "basicEnd", |args| {
        arity("basicEnd", args, 0)?;
        Ok(Value::Str("\n.word 0\n".to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Context;
    use crate::core::eval;

    fn ctx() -> Context {
        let mut symbols = HashMap::new();
        for extension in builtin() {
            extension.install(&mut symbols);
        }
        Context::new(symbols, Default::default())
    }

    #[test]
    fn constants_are_installed() {
        let mut ctx = ctx();
        assert_eq!(
            eval::expression("BASIC_START_ADDRESS", &mut ctx),
            Some(Value::Int(0x0801))
        );
        assert_eq!(
            eval::expression("CPU_IO_PORT", &mut ctx),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn ldax_generates_register_pair_load() {
        let mut ctx = ctx();
        let value = eval::expression("ldax(0x1234)", &mut ctx).unwrap();
        match value {
            Value::Str(text) => {
                assert!(text.contains("lda #lo(4660)"));
                assert!(text.contains("ldx #hi(4660)"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn stax_uses_consecutive_addresses() {
        let mut ctx = ctx();
        let value = eval::expression("stax(0xfb)", &mut ctx).unwrap();
        match value {
            Value::Str(text) => {
                assert!(text.contains("sta 251"));
                assert!(text.contains("stx 252"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn basic_sys_line_layout() {
        let mut ctx = ctx();
        let value = eval::expression("basicSys(10, 4096)", &mut ctx).unwrap();
        match value {
            Value::Str(text) => {
                assert!(text.contains(".word 10"));
                assert!(text.contains(".byte BASIC_TOKEN_SYS"));
                assert!(text.contains(".text \"4096\""));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn setw_immediate_and_copy_forms() {
        let mut ctx = ctx();
        let value = eval::expression("setw(0xfb, 0x1234)", &mut ctx).unwrap();
        match value {
            Value::Str(text) => {
                assert!(text.contains("lda #lo(4660)"));
                assert!(text.contains("sta 252"));
            }
            other => panic!("expected text, got {other:?}"),
        }

        let value = eval::expression("setw(0xfb, [0xc000])", &mut ctx).unwrap();
        match value {
            Value::Str(text) => {
                assert!(text.contains("lda 49152"));
                assert!(text.contains("lda 49153"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn wrong_argument_types_report_errors() {
        let mut ctx = ctx();
        assert_eq!(eval::expression("ldax(\"oops\")", &mut ctx), None);
        assert_eq!(ctx.errors.len(), 1);
    }
}
