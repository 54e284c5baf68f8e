// Resume tailoring: prompt building, the gated job bodies, and the merge that
// feeds the renderer.
// All model calls go through llm_client; all document work through render.

pub mod handlers;
pub mod merge;
pub mod pipeline;
pub mod prompts;
