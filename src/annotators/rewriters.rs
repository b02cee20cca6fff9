//! Stages that normalize post text through the post rewriting.
//!
//! Rewriters never touch the post text itself. They record replacements in
//! the post [`TextRewrite`](crate::core::TextRewrite), always through the
//! `try_` variants, so regions already rewritten by an earlier stage are
//! left alone.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::core::offsets::{is_word_char, lower_chars};
use crate::core::TextRewrite;
use crate::domain::{AnnotationBody, Post};

use super::Annotator;

/// Replaces links, mentions and hashtags with plain words.
///
/// - links are removed
/// - mentions become the username, followed by ` / <full name>` when known
/// - hashtags become their tokenization (or the bare tag); `#rt` is removed
///
/// A rewritten span followed (after whitespace) by another mention or
/// hashtag gets a `, ` separator; one followed by a capitalized word gets
/// `. ` so that taggers see a sentence break.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationRewriter;

impl Annotator for AnnotationRewriter {
    fn name(&self) -> String {
        "annotation_rewriter".to_string()
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        if post.text().is_none() {
            return Ok(());
        }
        let (spans, rewrite) = post.spans_and_rewrite()?;
        let text: Vec<char> = rewrite.original().chars().collect();

        for annotation in spans.iter() {
            let (begin, end) = (annotation.begin(), annotation.end());
            let replacement = match annotation.body() {
                AnnotationBody::Url(_) => String::new(),
                AnnotationBody::Mention(m) => match &m.full_name {
                    Some(full_name) => format!("{} / {}", m.username, full_name),
                    None => m.username.clone(),
                },
                AnnotationBody::Hashtag(_) if annotation.text().eq_ignore_ascii_case("#rt") => {
                    String::new()
                }
                AnnotationBody::Hashtag(h) => {
                    h.tokenization.clone().unwrap_or_else(|| h.hashtag.clone())
                }
                AnnotationBody::Entity(_) => continue,
            };
            rewrite.try_replace(begin, end, &replacement);

            // A link at the very beginning needs no separator
            if begin == 0 && matches!(annotation.body(), AnnotationBody::Url(_)) {
                continue;
            }
            for (i, &ch) in text.iter().enumerate().skip(end) {
                if ch == '#' || ch == '@' {
                    rewrite.try_replace(end, i, ", ");
                } else if ch.is_uppercase() {
                    rewrite.try_replace(end, i, ". ");
                } else if !ch.is_whitespace() {
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Italian words legitimately written with a trailing apostrophe
const APOSTROPHE_WORDS: &[&str] = &["fa", "va", "sta", "da", "po", "mo"];

const EMOTICONS: &[&str] = &[
    ":‑)", ":)", ":-]", ":]", ":-3", ":3", ":->", ":>", "8-)", "8)", ":-}", ":}", ":o)", ":c)",
    ":^)", "=]", "=)", ":‑D", ":D", "8‑D", "8D", "x‑D", "xD", "X‑D", "XD", "=D", "=3", "B^D",
    ":))", ":-))", ":‑(", ":(", ":‑c", ":c", ":‑<", ":<", ":‑[", ":[", ":-||", ">:[", ":{", ":@",
    ">:(", ":'‑(", ":'(", ":'‑)", ":')", "D‑':", "D:<", "D:", "D8", "D;", "D=", "DX", ":‑O",
    ":O", ":‑o", ":o", ":-0", "8‑0", ">:O", ":-*", ":*", ":×", ";‑)", ";)", "*-)", "*)", ";‑]",
    ";]", ";^)", ":‑,", ";D", ":‑P", ":P", "X‑P", "XP", "x‑p", "xp", ":‑p", ":p", ":‑Þ", ":Þ",
    ":‑þ", ":þ", ":‑b", ":b", "d:", "=p", ">:P", ":‑/", ":/", ":‑.", ">:\\", ">:/", ":\\", "=/",
    "=\\", ":L", "=L", ":S", ":‑|", ":|", ":$", ":‑X", ":X", ":‑#", ":#", ":‑&", ":&", "O:‑)",
    "O:)", "0:‑3", "0:3", "0:‑)", "0:)", "0;^)", ">:‑)", ">:)", "}:‑)", "}:)", "3:‑)", "3:)",
    ">;)", "|;‑)", "|‑O", ":‑J", "#‑)", "%‑)", "%)", ":‑###..", ":###..", "<:‑|", "~(_8^(I)",
    "5:‑)", "*<|:‑)", "=:o]", "7:^]", ",:‑)", "</3", "<3", "@};-", "@}->--", "@}‑;‑'‑‑‑",
    "@>‑‑>‑‑", "><>", "<*)))‑{", "><(((*>", "\\o/", "//0‑0\\", "v.v", "O_O", "o‑o", "O_o",
    "o_O", "o_o", "O-O", ">.<", "^5", "o/\\o", ">_>^", "^<_<",
];

/// HTML entities and escapes found in scraped posts
const UNESCAPES: &[(&str, &str)] = &[("\\\"", "\""), ("&lt;", "<"), ("&gt;", ">"), ("&amp;", "&")];

/// Removes emoticons, restores accents written as apostrophes and unescapes
/// a few HTML entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleaningRewriter;

impl CleaningRewriter {
    fn remove_emoticons(post_id: &str, rewrite: &mut TextRewrite) {
        let text: Vec<char> = rewrite.original().chars().collect();
        let mut start = None;
        for i in 0..=text.len() {
            if i < text.len() && !text[i].is_whitespace() {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                let token: String = text[s..i].iter().collect();
                if EMOTICONS.contains(&token.as_str()) && rewrite.try_replace(s, i, "") {
                    debug!(post = %post_id, emoticon = %token, "Removed emoticon");
                }
            }
        }
    }

    /// `citta'` becomes `città`, `perche'` becomes `perchè`.
    ///
    /// Apostrophes opening a quote (`'word`) suspend the rule until the
    /// matching closing apostrophe.
    fn restore_accents(rewrite: &mut TextRewrite) {
        let text = lower_chars(rewrite.original());
        let mut maybe_quote = false;

        for index in (0..text.len()).filter(|&i| text[i] == '\'') {
            let mut start = index;
            while start > 0 && is_word_char(text[start - 1]) {
                start -= 1;
            }
            let word: String = text[start..index].iter().collect();
            let after_letter = !word.is_empty();
            let before_letter = text.get(index + 1).is_some_and(|c| c.is_alphabetic());

            if !after_letter && before_letter {
                maybe_quote = true;
            } else if maybe_quote && after_letter && !before_letter {
                maybe_quote = false;
            } else if !maybe_quote
                && after_letter
                && !before_letter
                && !APOSTROPHE_WORDS.contains(&word.as_str())
            {
                let accented = match text[index - 1] {
                    'a' => "à",
                    'e' => "è",
                    'i' => "ì",
                    'o' => "ò",
                    'u' => "ù",
                    _ => continue,
                };
                rewrite.try_replace(index - 1, index + 1, accented);
            }
        }
    }
}

impl Annotator for CleaningRewriter {
    fn name(&self) -> String {
        "cleaning_rewriter".to_string()
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        if post.text().is_none() {
            return Ok(());
        }
        let id = post.id().to_string();
        let rewrite = post.ensure_rewrite()?;

        Self::remove_emoticons(&id, rewrite);
        Self::restore_accents(rewrite);
        for (escaped, plain) in UNESCAPES {
            rewrite.try_replace_all(escaped, plain, false);
        }
        Ok(())
    }
}

/// Parameters of [`SlangRewriter`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlangParams {
    /// Inline `word: expansion` pairs
    #[serde(default)]
    pub replacements: HashMap<String, String>,

    /// TSV file of `word<TAB>expansion` lines, relative to the pipeline file
    #[serde(default)]
    pub file: Option<String>,
}

/// Expands slang words and abbreviations (e.g. `cmq` → `comunque`).
#[derive(Debug, Clone, Default)]
pub struct SlangRewriter {
    replacements: HashMap<String, String>,
}

impl SlangRewriter {
    pub fn new<I, K, V>(replacements: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            replacements: replacements
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Build from parameters, reading the optional TSV file relative to `base_dir`
    pub fn from_params(params: SlangParams, base_dir: &Path) -> Result<Self> {
        let mut rewriter = Self::new(params.replacements);
        if let Some(file) = params.file {
            let path = base_dir.join(file);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read slang file: {}", path.display()))?;
            rewriter.extend_from_tsv(&content);
        }
        Ok(rewriter)
    }

    /// Add `word<TAB>expansion` lines; other lines are ignored
    pub fn extend_from_tsv(&mut self, content: &str) {
        for line in content.lines() {
            if let Some((word, expansion)) = line.split_once('\t') {
                self.replacements
                    .insert(word.trim().to_lowercase(), expansion.trim().to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    fn expansion_for(&self, word: &str) -> Option<String> {
        let expansion = self.replacements.get(&word.to_lowercase())?;
        let capitalized = word.chars().next().is_some_and(char::is_uppercase)
            && word.to_uppercase() != word;
        if !capitalized {
            return Some(expansion.clone());
        }
        let mut chars = expansion.chars();
        Some(match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        })
    }
}

impl Annotator for SlangRewriter {
    fn name(&self) -> String {
        "slang_rewriter".to_string()
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        if post.text().is_none() || self.replacements.is_empty() {
            return Ok(());
        }
        let rewrite = post.ensure_rewrite()?;
        let text: Vec<char> = rewrite.original().chars().collect();

        let mut start = None;
        for i in 0..=text.len() {
            if i < text.len() && is_word_char(text[i]) {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                let word: String = text[s..i].iter().collect();
                if let Some(expansion) = self.expansion_for(&word) {
                    if rewrite.try_replace(s, i, &expansion) {
                        debug!(%word, %expansion, "Expanded slang word");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnotationKind;

    fn rewritten(post: &Post) -> &str {
        post.rewrite().map(|r| r.rewritten()).unwrap_or("")
    }

    #[test]
    fn test_annotation_rewriter() {
        let mut post = Post::new("p").with_text("@john ke #bellacosa #forzainter");
        let mention = post.annotations()[0].id();
        post.annotation_mut(mention)
            .and_then(|a| a.as_mention_mut())
            .unwrap()
            .full_name = Some("John Smith".to_string());
        let tags: Vec<_> = post
            .annotations_of(AnnotationKind::Hashtag, None)
            .map(|a| a.id())
            .collect();
        post.annotation_mut(tags[0])
            .and_then(|a| a.as_hashtag_mut())
            .unwrap()
            .tokenization = Some("bella cosa".to_string());

        AnnotationRewriter.annotate(&mut post).unwrap();
        assert_eq!(rewritten(&post), "john / John Smith ke bella cosa, forzainter");
    }

    #[test]
    fn test_annotation_rewriter_sentence_break() {
        let mut post = Post::new("p").with_text("https://t.co/abc @bob Ciao #rt");
        AnnotationRewriter.annotate(&mut post).unwrap();
        assert_eq!(rewritten(&post), " bob. Ciao ");
    }

    #[test]
    fn test_annotation_rewriter_without_text() {
        let mut post = Post::new("p");
        AnnotationRewriter.annotate(&mut post).unwrap();
        assert!(post.rewrite().is_none());
    }

    #[test]
    fn test_cleaning_rewriter() {
        let mut post = Post::new("p").with_text("perche' no :) citta' &amp; va' 'bello'");
        CleaningRewriter.annotate(&mut post).unwrap();
        assert_eq!(rewritten(&post), "perchè no  città & va' 'bello'");
    }

    #[test]
    fn test_slang_rewriter() {
        let slang = SlangRewriter::new([("cmq", "comunque"), ("nn", "non")]);
        let mut post = Post::new("p").with_text("Cmq nn CMQ ok cmq");
        slang.annotate(&mut post).unwrap();
        assert_eq!(rewritten(&post), "Comunque non comunque ok comunque");
    }

    #[test]
    fn test_slang_tsv() {
        let mut slang = SlangRewriter::default();
        slang.extend_from_tsv("xke\tperché\nbroken line\ntvb\tti voglio bene\n");
        assert_eq!(slang.len(), 2);
        assert_eq!(slang.expansion_for("Xke").as_deref(), Some("Perché"));
    }
}
