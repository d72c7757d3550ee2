//! Synthesis and repair prompts.

use articlegen_shared::{ArticleRequest, ResearchContext, Style};

/// Display name of a language tag, for prompt instructions.
pub fn language_name(tag: &str) -> &str {
    match tag {
        "pt" => "Portuguese",
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "ru" => "Russian",
        "ja" => "Japanese",
        "zh" => "Chinese",
        other => other,
    }
}

fn style_guidance(style: Style) -> &'static str {
    match style {
        Style::Informative => {
            "Write in a clear, neutral, informative tone for a general audience. \
             Explain technical terms when they first appear."
        }
        Style::Academic => {
            "Write in a formal academic register. Use precise terminology, \
             define concepts rigorously and keep an objective, analytical voice."
        }
        Style::Journalistic => {
            "Write in a journalistic style. Open with the most important facts, \
             keep paragraphs short and favour concrete details over abstraction."
        }
    }
}

fn research_block(research: &ResearchContext) -> String {
    let mut block = format!("Title: {}\n", research.title);
    for source in &research.sources {
        block.push_str(&format!("Source: {source}\n"));
    }
    if research.truncated {
        block.push_str("Note: the material below is an excerpt of a longer article.\n");
    }
    block.push('\n');
    block.push_str(&research.body);
    block
}

/// First-round prompt: research material plus structure and length rules.
pub fn synthesis_prompt(request: &ArticleRequest, research: &ResearchContext) -> String {
    let language = language_name(request.language());
    let min_words = request.min_words();

    format!(
        "You are an expert writer. Write an original article about \"{topic}\" in {language}.\n\
         \n\
         Use only the facts in the research material below. Do not invent facts, \
         figures, quotes or references.\n\
         \n\
         {style}\n\
         \n\
         Required structure, in Markdown:\n\
         - A title as a level-1 heading (`# Title`) on the first line.\n\
         - An introduction of one or two paragraphs.\n\
         - Between 3 and 5 sections, each with a level-2 heading (`## Section`).\n\
         - A conclusion.\n\
         \n\
         The article MUST contain at least {min_words} words. Reply with the article only, \
         without any preamble or closing remarks.\n\
         \n\
         --- RESEARCH MATERIAL ---\n\
         {research}\n\
         --- END OF RESEARCH MATERIAL ---\n",
        topic = request.topic(),
        style = style_guidance(request.style()),
        research = research_block(research),
    )
}

/// Follow-up prompt after a draft came in under the minimum word count.
pub fn repair_prompt(
    request: &ArticleRequest,
    research: &ResearchContext,
    previous_draft: &str,
    previous_words: usize,
) -> String {
    let min_words = request.min_words();
    let deficit = min_words.saturating_sub(previous_words);

    format!(
        "{base}\n\
         Your previous draft had {previous_words} words, {deficit} short of the required \
         minimum of {min_words}. Expand it: develop every section with more detail from the \
         research material, and add a section if the structure allows it. Keep the same \
         title and structure. Return the complete expanded article.\n\
         \n\
         --- PREVIOUS DRAFT ---\n\
         {previous_draft}\n\
         --- END OF PREVIOUS DRAFT ---\n",
        base = synthesis_prompt(request, research),
    )
}
