use crate::{
    error::{Error, ErrorKind},
    libraries::{Library, Registrar},
    native::NativeCtx,
    value::Value,
};

fn char_offset(ctx: &NativeCtx<'_>, i: usize) -> Result<usize, Error> {
    let n = ctx.number(i)?;
    if n < 0.0 {
        return Err(Error::new(ErrorKind::OutOfRange, "negative string offset"));
    }
    Ok(n as usize)
}

/// String helpers: `length`, `at`, and the overloaded `substr` pair.
pub(crate) struct StringLib;

impl Library for StringLib {
    fn name(&self) -> &str {
        "string"
    }

    fn load(&self, reg: &mut Registrar<'_>) -> Result<(), Error> {
        reg.register_function("length", &["string"], |ctx| {
            Ok(Some(Value::Number(ctx.text(0)?.chars().count() as f64)))
        })?;
        reg.register_function("at", &["string", "number"], |ctx| {
            let index = char_offset(ctx, 1)?;
            let c = ctx.text(0)?.chars().nth(index).ok_or_else(|| {
                Error::new(ErrorKind::OutOfRange, format!("string index {index} out of range"))
            })?;
            Ok(Some(Value::Text(c.to_string())))
        })?;
        reg.register_function("substr", &["string", "number"], |ctx| {
            let offset = char_offset(ctx, 1)?;
            let tail: String = ctx.text(0)?.chars().skip(offset).collect();
            Ok(Some(Value::Text(tail)))
        })?;
        reg.register_function("substr", &["string", "number", "number"], |ctx| {
            let offset = char_offset(ctx, 1)?;
            let count = char_offset(ctx, 2)?;
            let piece: String = ctx.text(0)?.chars().skip(offset).take(count).collect();
            Ok(Some(Value::Text(piece)))
        })
    }
}
