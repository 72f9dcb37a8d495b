mod compare;
mod error;
mod health;
mod scan;
mod videos;

pub use compare::{compare_videos, get_results};
pub use error::ApiError;
pub use health::{health, metrics, serve_index};
pub use scan::process_video;
pub use videos::{list_videos, upload};

use plate_common::metrics::HTTP_REQUESTS;

fn count_request(route: &str) {
    HTTP_REQUESTS.with_label_values(&[route]).inc();
}
