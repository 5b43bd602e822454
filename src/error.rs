use std::process::ExitCode;

/// Conditions that end the whole run instead of skipping one story.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("could not fetch main page {url}: HTTP {status}")]
    MainPage { url: String, status: u16 },

    #[error("gave up looking for {title:?} after {pages} listing pages")]
    ListingPagesExhausted { title: String, pages: u32 },
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MainPage { .. } => 1,
            Self::ListingPagesExhausted { .. } => 10,
        }
    }
}

pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FatalError>())
        .map(|fatal| ExitCode::from(fatal.exit_code()))
        .unwrap_or(ExitCode::FAILURE)
}
