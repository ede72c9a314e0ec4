use crate::{
    error::Error,
    libraries::{Library, Registrar},
    value::Value,
};

/// A host-owned file handle, exposed to scripts as the native type `file`.
#[derive(Debug, Default)]
pub(crate) struct File {
    path: String,
}

/// File access: the `file` native type with `open_f`, `read_f`, `close_f`.
///
/// Unlike the core libraries this one is not loaded at engine
/// construction; it loads on `@import file`.
pub(crate) struct FileLib;

impl Library for FileLib {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self, reg: &mut Registrar<'_>) -> Result<(), Error> {
        reg.register_type::<File>("file", None)?;
        reg.register_function("open_f", &["string"], |ctx| {
            let path = ctx.text(0)?.to_owned();
            Ok(Some(ctx.new_native("file", File { path })))
        })?;
        reg.register_function("read_f", &["file"], |ctx| {
            let path = ctx.native_mut::<File>(0)?.path.clone();
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::host(format!("cannot read '{path}': {e}")))?;
            Ok(Some(Value::Text(contents)))
        })?;
        reg.register_function("close_f", &["file"], |ctx| {
            let file = ctx.native_mut::<File>(0)?;
            file.path.clear();
            Ok(None)
        })
    }
}
