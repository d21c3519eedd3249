pub mod attachment;
pub mod provider;
pub mod question;
pub mod request;

pub use attachment::ImageAttachment;
pub use provider::{ProviderAttempt, ProviderName};
pub use question::{
    BatchResult, GeneratedQuestion, GenerationRequest, QuestionType, RawQuestion,
    TRUE_FALSE_OPTIONS,
};
pub use request::{
    ChatRole, ChatTurn, ExplainRequest, ExplainResponse, ExplanationLevel,
    FollowUpRequest, FollowUpResponse, GenerateQuestionsRequest, GenerateQuestionsResponse,
    StudyPlanRequest, StudyPlanResponse, SummarizeRequest, SummarizeResponse, SummaryComplexity,
};
