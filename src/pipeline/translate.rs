use std::collections::HashMap;

use crate::error::RetextError;
use crate::progress::ConsoleProgress;

/// A translation backend: one output per input, positionally aligned.
///
/// `feedback` carries a corrective instruction when a previous attempt for the same batch came
/// back with the wrong number of strings.
pub trait Translator {
    fn translate(&mut self, texts: &[String], feedback: Option<&str>)
        -> anyhow::Result<Vec<String>>;
}

/// Returns every string unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(
        &mut self,
        texts: &[String],
        _feedback: Option<&str>,
    ) -> anyhow::Result<Vec<String>> {
        Ok(texts.to_vec())
    }
}

/// Exact lookup on the whitespace-trimmed text; the original surrounding whitespace is kept.
/// Misses pass through unchanged.
#[derive(Clone, Debug, Default)]
pub struct GlossaryTranslator {
    terms: HashMap<String, String>,
}

impl GlossaryTranslator {
    pub fn new(terms: HashMap<String, String>) -> Self {
        let terms = terms
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v))
            .collect();
        Self { terms }
    }

    fn lookup(&self, text: &str) -> String {
        let core = text.trim();
        let Some(hit) = self.terms.get(core) else {
            return text.to_string();
        };
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];
        format!("{lead}{hit}{trail}")
    }
}

impl Translator for GlossaryTranslator {
    fn translate(
        &mut self,
        texts: &[String],
        _feedback: Option<&str>,
    ) -> anyhow::Result<Vec<String>> {
        Ok(texts.iter().map(|t| self.lookup(t)).collect())
    }
}

/// Drives a `Translator` in bounded batches.
///
/// Empty strings are echoed without being sent. A batch whose reply has the wrong length is
/// retried with corrective feedback; when the attempts run out the whole call fails.
pub struct BatchTranslator<'a> {
    inner: &'a mut dyn Translator,
    batch_size: usize,
    max_attempts: usize,
}

impl<'a> BatchTranslator<'a> {
    pub fn new(inner: &'a mut dyn Translator, batch_size: usize, max_attempts: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn translate_all(
        &mut self,
        texts: &[String],
        progress: &ConsoleProgress,
    ) -> anyhow::Result<Vec<String>> {
        let mut out: Vec<String> = texts.to_vec();
        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(i, _)| i)
            .collect();
        let total = pending.len();
        let mut done = 0usize;
        for chunk in pending.chunks(self.batch_size) {
            let batch: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let translated = self.translate_batch(&batch)?;
            for (&i, t) in chunk.iter().zip(translated) {
                out[i] = t;
            }
            done += chunk.len();
            progress.progress("translate", done, total);
        }
        Ok(out)
    }

    fn translate_batch(&mut self, batch: &[String]) -> anyhow::Result<Vec<String>> {
        let mut feedback: Option<String> = None;
        let mut got = 0usize;
        for attempt in 1..=self.max_attempts {
            let reply = self.inner.translate(batch, feedback.as_deref())?;
            if reply.len() == batch.len() {
                return Ok(reply);
            }
            got = reply.len();
            log::warn!(
                "batch attempt {attempt}/{}: expected {} string(s), got {got}",
                self.max_attempts,
                batch.len()
            );
            feedback = Some(format!(
                "Your previous reply contained {got} item(s) but the input has {}. \
                 Return exactly {} item(s), one per input, in the same order.",
                batch.len(),
                batch.len()
            ));
        }
        Err(RetextError::BatchMisaligned {
            attempts: self.max_attempts,
            expected: batch.len(),
            got,
        }
        .into())
    }
}
