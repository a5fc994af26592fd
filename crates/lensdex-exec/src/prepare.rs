//! Index (re)creation before a run.

use tracing::{info, warn};

use lensdex_io::IndexStore;

use crate::error::ExecError;
use crate::pipeline::OutputTarget;

/// With `clear`, delete `target.index` (ignoring failures), create it again
/// and install its mapping, if any. Without `clear` this does nothing and
/// documents are added to whatever the index already holds.
pub async fn prepare_index(
    store: &dyn IndexStore,
    target: &OutputTarget,
    clear: bool,
) -> Result<(), ExecError> {
    if !clear {
        return Ok(());
    }
    if let Err(e) = store.delete(&target.index).await {
        warn!(index = %target.index, error = %e, "delete before recreate failed");
    }
    store.create(&target.index).await?;
    if let Some(mapping) = &target.mapping {
        store
            .put_mapping(&target.index, &target.doc_type, mapping)
            .await?;
    }
    info!(index = %target.index, mapping = target.mapping.is_some(), "index recreated");
    Ok(())
}
