//! Customer Operations
//!
//! Use cases for the customer lifecycle.

pub mod signup;
pub mod email_verify;
pub mod complete_signup;
pub mod freeze;
pub mod recover;

pub use signup::{SignupCommand, SignupResult, SignupUseCase};
pub use email_verify::{EmailVerifyCommand, EmailVerifyResult, EmailVerifyUseCase};
pub use complete_signup::{CompleteSignupCommand, CompleteSignupResult, CompleteSignupUseCase};
pub use freeze::{FreezeCustomerCommand, FreezeCustomerUseCase};
pub use recover::{RecoverCustomerCommand, RecoverCustomerUseCase};
