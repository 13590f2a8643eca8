//! Entry points called by the host extension: page messages and options-page actions.

pub mod analysis;
pub mod settings;

pub use analysis::{
    handle_content_request, ClientFactory, ContentRequest, ContentResponse, HttpClientFactory,
};
