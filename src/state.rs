use std::sync::Arc;

use crate::{
    config::Configuration, process::ToolRunner, repo::ArcRepo, store::file_store::FileStore,
    tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State<S> {
    pub(super) config: Configuration,
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) repo: ArcRepo,
    pub(super) store: S,
    pub(super) assets: FileStore,
    pub(super) tools: Arc<dyn ToolRunner>,
}
