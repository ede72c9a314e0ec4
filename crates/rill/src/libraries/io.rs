use std::io::BufRead as _;

use crate::{
    error::Error,
    libraries::{Library, Registrar},
    value::{Value, lenient_number},
};

fn read_stdin_line() -> Result<String, Error> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::host(format!("stdin read failed: {e}")))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Console I/O: `print`, `println`, `getln`, `getnum`.
pub(crate) struct IoLib;

impl Library for IoLib {
    fn name(&self) -> &str {
        "io"
    }

    fn load(&self, reg: &mut Registrar<'_>) -> Result<(), Error> {
        reg.register_function("print", &["any"], |ctx| {
            let text = ctx.display(0);
            ctx.print().write_text(&text)?;
            Ok(None)
        })?;
        reg.register_function("println", &["any"], |ctx| {
            let text = ctx.display(0);
            ctx.print().write_text(&text)?;
            ctx.print().write_newline()?;
            Ok(None)
        })?;
        reg.register_function("getln", &[], |_ctx| Ok(Some(Value::Text(read_stdin_line()?))))?;
        reg.register_function("getnum", &[], |_ctx| {
            let line = read_stdin_line()?;
            Ok(Some(Value::Number(lenient_number(&line))))
        })
    }
}
