//! Built-in steps for Stepsheet.
//!
//! Each step kind pairs a [`StepPerformer`](stepsheet::StepPerformer) with a
//! [`CodeChunk`](stepsheet::CodeChunk). Enable step groups via feature flags.
//!
//! # Features
//!
//! - `ai` (default) - `ai_transformation`
//! - `import` (default) - `simple_import`
//! - `columns` (default) - `add_column`, `rename_column`, `delete_column`
//! - `duplicate` (default) - `dataframe_duplicate`

use stepsheet::{ChunkContext, ExecutionData, Params, Registry, RegistryError, State};
use std::sync::Arc;

#[cfg(feature = "columns")]
mod add_column;
#[cfg(feature = "ai")]
mod ai_transformation;
#[cfg(feature = "duplicate")]
mod dataframe_duplicate;
#[cfg(feature = "columns")]
mod delete_column;
#[cfg(feature = "ai")]
pub mod recon;
#[cfg(feature = "columns")]
mod rename_column;
#[cfg(feature = "import")]
mod simple_import;

#[cfg(feature = "columns")]
pub use add_column::{AddColumn, AddColumnChunk};
#[cfg(feature = "ai")]
pub use ai_transformation::{AiTransformation, AiTransformationChunk};
#[cfg(feature = "duplicate")]
pub use dataframe_duplicate::{DataframeDuplicate, DataframeDuplicateChunk};
#[cfg(feature = "columns")]
pub use delete_column::{DeleteColumn, DeleteColumnChunk};
#[cfg(feature = "columns")]
pub use rename_column::{RenameColumn, RenameColumnChunk};
#[cfg(feature = "import")]
pub use simple_import::{SimpleImport, SimpleImportChunk};

/// Register all enabled steps with the registry.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    #[cfg(feature = "ai")]
    registry.register(AiTransformation)?;
    #[cfg(feature = "import")]
    registry.register(SimpleImport)?;
    #[cfg(feature = "columns")]
    {
        registry.register(AddColumn)?;
        registry.register(RenameColumn)?;
        registry.register(DeleteColumn)?;
    }
    #[cfg(feature = "duplicate")]
    registry.register(DataframeDuplicate)?;
    Ok(())
}

/// A registry holding every enabled step.
pub fn default_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

/// Context for a chunk built straight from a step's inputs.
fn chunk_context(
    prev_state: &Arc<State>,
    post_state: &Arc<State>,
    params: &Params,
    execution_data: Option<&ExecutionData>,
) -> ChunkContext {
    ChunkContext::new(
        Arc::clone(prev_state),
        Arc::clone(post_state),
        params.clone(),
        execution_data.cloned(),
    )
}

/// Names of dataframes present in `post` but not in `prev`, in index order.
#[cfg_attr(not(any(feature = "import", feature = "duplicate")), allow(dead_code))]
fn new_dataframe_names<'a>(prev: &State, post: &'a State) -> Vec<&'a str> {
    post.df_names()
        .filter(|name| prev.frame(name).is_none())
        .collect()
}
