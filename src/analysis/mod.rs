pub mod checklist;
pub mod product;
pub mod recommender;
pub mod shop;
pub mod validator;

pub use checklist::{ChecklistEvaluator, EvalData};
pub use product::ProductAnalyzer;
pub use recommender::Recommender;
pub use shop::ShopAnalyzer;
pub use validator::DataValidator;
