mod catalog;

pub use catalog::{
    avatar_persona_prompt, build_jobs, GenerationJob, JobTemplate, AVATAR_TEMPLATES,
    BASE_TEMPLATES,
};
