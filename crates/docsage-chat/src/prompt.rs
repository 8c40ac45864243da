//! Prompt construction for grounded answers.

use docsage_core::RetrievedDocument;

/// The reply the model is told to give when the context is insufficient.
pub const REFUSAL: &str = "I cannot find the answer in the provided documents.";

/// Citation label for one retrieved entry: `Page 3` or `Page 3 (Image 0)`.
pub fn reference(doc: &RetrievedDocument) -> String {
    let page = doc
        .page()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".into());
    match doc.image_index() {
        Some(idx) => format!("Page {} (Image {})", page, idx),
        None => format!("Page {}", page),
    }
}

/// Render retrieved entries as context blocks, in rank order.
pub fn build_context(docs: &[RetrievedDocument]) -> String {
    docs.iter()
        .map(|doc| {
            format!(
                "Source: {} [{}]\nContent: {}",
                doc.source().unwrap_or("Unknown"),
                reference(doc),
                doc.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn system_prompt(context: &str) -> String {
    format!(
        "You are an advanced Multi-Modal RAG assistant.\n\
         You answer questions based on the provided context, which includes text and detailed \
         descriptions of images, charts, and tables from documents.\n\
         The user cannot see the original images, only your extracted descriptions.\n\
         Always cite your sources using the [Page X] format provided in the context.\n\
         If the context doesn't contain the answer, say \"{}\"\n\
         \n\
         Context:\n\
         {}\n",
        REFUSAL, context
    )
}
