mod error;
mod request;
mod response;

pub use error::AppError;
pub use request::{
    CachePolicy, CallerContext, Capabilities, Handler, Request, RequestContext,
};
pub use response::GetListResponse;
