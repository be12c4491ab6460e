//! `dendron export`: build the dataset bundle for an explicit id list, every
//! `READY_FOR_EXPORT` tree, or every tree authored by a given user, and write
//! it as JSON (optionally gzip-compressed) to a file or stdout.

use std::path::PathBuf;

use uuid::Uuid;

use dendron_manager::export;
use dendron_manager::PgStore;

use crate::error::CliResult;

/// Which trees to include in the bundle.
pub enum ExportTarget {
    Ids(Vec<Uuid>),
    AllReady,
    AllUser(Uuid),
}

pub async fn run(
    store: &PgStore,
    target: ExportTarget,
    reviewed_only: bool,
    include_deleted: bool,
    gzip: bool,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let trees = match target {
        ExportTarget::Ids(ids) => export::export_trees(store, &ids, reviewed_only, include_deleted).await?,
        ExportTarget::AllReady => export::export_all_ready_trees(store, reviewed_only, include_deleted).await?,
        ExportTarget::AllUser(user_id) => {
            export::export_all_user_trees(store, user_id, reviewed_only, include_deleted).await?
        }
    };

    tracing::info!(trees = trees.len(), "export bundle built");

    if gzip {
        let bytes = export::to_json_gz(&trees)?;
        write_out(out, &bytes)
    } else {
        let json = export::to_json(&trees)?;
        write_out(out, json.as_bytes())
    }
}

fn write_out(out: Option<PathBuf>, bytes: &[u8]) -> CliResult<()> {
    use std::io::Write;
    match out {
        Some(path) => {
            std::fs::write(&path, bytes)?;
            tracing::info!(path = %path.display(), "export written");
        }
        None => {
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}
