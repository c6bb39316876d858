mod evaluator;
mod extractor;
mod parser;
/// 断言模块 - 对响应执行期望检查
mod types;

pub use evaluator::{evaluate_assertion, verify};
pub use extractor::extract_value;
pub use parser::parse_assertion;
pub use types::{
    AssertError, AssertExpr, AssertValue, AssertionResult, CompareOp, Expectation, ValuePath,
    Verdict,
};
