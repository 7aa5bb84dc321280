// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod errors;
pub mod handlers;
pub mod http_server;

pub use detect::{detect_handler, DetectQuery, DetectionResponse, Orient};
pub use errors::{ApiError, ApiErrorResponse, ErrorResponse};
pub use handlers::{HealthResponse, ModelsResponse};
pub use http_server::{create_router, start_server, AppState};
