use crate::{
    error::{Error, ErrorKind},
    libraries::{Library, Registrar},
    value::Value,
};

/// Array helpers: `size`, `push`, `pop`.
pub(crate) struct ArrayLib;

impl Library for ArrayLib {
    fn name(&self) -> &str {
        "array"
    }

    fn load(&self, reg: &mut Registrar<'_>) -> Result<(), Error> {
        reg.register_function("size", &["array"], |ctx| {
            Ok(Some(Value::Number(ctx.array(0)?.len() as f64)))
        })?;
        reg.register_function("push", &["array", "any"], |ctx| {
            let value = ctx.clone_arg(1);
            match ctx.array_mut(0) {
                Ok(values) => {
                    values.push(value);
                    Ok(None)
                }
                Err(e) => {
                    ctx.drop_value(value);
                    Err(e)
                }
            }
        })?;
        reg.register_function("pop", &["array"], |ctx| match ctx.array_mut(0)?.pop() {
            Some(value) => {
                ctx.drop_value(value);
                Ok(None)
            }
            None => Err(Error::new(ErrorKind::OutOfRange, "pop from an empty array")),
        })
    }
}
