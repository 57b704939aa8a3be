//! Decode-job command implementation.

use super::{read_file, CliResult, Format};
use shopsync_core::JobRequest;
use std::path::Path;

/// Decodes a CBOR job payload stored in `path`.
pub fn decode(path: &Path) -> CliResult<JobRequest> {
    let bytes = read_file(path)?;
    Ok(JobRequest::from_bytes(&bytes)?)
}

/// Runs the decode-job command.
pub fn run(path: &Path, format: Format) -> CliResult<()> {
    let request = decode(path)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&request)?),
        Format::Text => {
            println!("Function: {}", request.function);
            println!("Backend:  {}", request.descriptor.backend_id);
            println!("Model:    {}", request.descriptor.model);
            println!("Target:   {}", request.target);
            println!("Priority: {}", request.effective_priority());
            if let Some(fields) = &request.fields {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                println!("Fields:   {}", fields.join(", "));
            }
            if !request.extra.is_empty() {
                println!("Extra:    {}", serde_json::to_string(&request.extra)?);
            }
            println!(
                "Session:  uid {}{}{}",
                request.session.uid,
                request
                    .session
                    .lang
                    .as_deref()
                    .map(|lang| format!(", lang {}", lang))
                    .unwrap_or_default(),
                if request.session.no_export { ", no export" } else { "" }
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CliError;
    use shopsync_core::{
        field_set, BackendId, JobFunction, JobTarget, LocalId, SessionContext, PICKING_TYPE_ARG,
    };
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn payload(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn queued_payload_decodes() {
        let request = JobRequest::new(
            JobFunction::ExportPickingDone,
            BackendId::new(1),
            "magento.stock.picking",
            JobTarget::Local(LocalId::new(12)),
        )
        .with_fields(Some(field_set(["name"])))
        .with_extra(PICKING_TYPE_ARG, "partial")
        .with_priority(5)
        .with_session(SessionContext::new(2).with_lang("fr_FR"));
        let file = payload(&request.to_bytes().unwrap());

        assert_eq!(decode(file.path()).unwrap(), request);
    }

    #[test]
    fn garbage_is_rejected() {
        let file = payload(b"not a job");

        assert!(matches!(decode(file.path()), Err(CliError::Sync(_))));
    }
}
