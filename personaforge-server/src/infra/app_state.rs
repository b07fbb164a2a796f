use std::{fmt, sync::Arc};

use personaforge_config::Config;
use personaforge_core::{
    VideoJobService,
    collaborators::{SpeechSynthesizer, TextGenerator},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub videos: VideoJobService,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub text: Arc<dyn TextGenerator>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("videos", &self.videos)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        videos: VideoJobService,
        speech: Arc<dyn SpeechSynthesizer>,
        text: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            videos,
            speech,
            text,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
