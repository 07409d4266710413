mod test;
mod test_result;
mod web_service;

pub use test::{AssertionV1, Auth, Method, Parameters, Schedule, Test, TestRequest, Timeout};
pub use test_result::{IsSuccessFilter, TestResult};
pub use web_service::{WebService, WebServiceRequest};
