//! Image-reference placeholders inside manifest fragments.
//!
//! Fragments refer to the images built during a run through `${<COMPONENT>_IMAGE}`
//! variables, e.g. `image: ${HADOOP_IMAGE}`. Substitution happens when the
//! fragments are merged, after every image name is known.
//!
//! # Syntax
//!
//! - `${NAME}` is a variable reference.
//! - `$$` is the compose escape for a literal `$` and passes through untouched,
//!   so `$${NAME}` is never substituted.
//! - A single `$` not followed by `{`, and an unclosed `${`, are literal text.
//!
//! Variables the resolver does not know are written back verbatim; compose
//! resolves them from its own environment later.
//!
//! # Example
//!
//! ```
//! use dbd_lib::placeholder::{parse, Segment};
//!
//! let segments = parse("${HADOOP_IMAGE} on $HOST");
//! assert_eq!(segments, vec![
//!     Segment::Variable("HADOOP_IMAGE".to_string()),
//!     Segment::Literal(" on $HOST".to_string()),
//! ]);
//! ```

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// The name inside `${...}`
  Variable(String),
}

/// Looks up the value of a placeholder variable.
pub trait Resolver {
  fn resolve(&self, name: &str) -> Option<&str>;
}

/// The placeholder variable naming the image of `component`.
///
/// `hadoop` becomes `HADOOP_IMAGE`, `spark-history` becomes `SPARK_HISTORY_IMAGE`.
pub fn image_variable(component: &str) -> String {
  let mut name: String = component
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
    .collect();
  name.push_str("_IMAGE");
  name
}

/// Split `input` into literal text and variable references.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.chars().peekable();

  while let Some(ch) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some('$') => {
        // "$$" escapes the next character for compose; keep both
        chars.next();
        literal.push_str("$$");
      }
      Some('{') => {
        chars.next();
        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
          if c == '}' {
            closed = true;
            break;
          }
          name.push(c);
        }

        if closed && !name.is_empty() {
          if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
          }
          segments.push(Segment::Variable(name));
        } else {
          literal.push_str("${");
          literal.push_str(&name);
          if closed {
            literal.push('}');
          }
        }
      }
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

/// Substitute every known variable in `input`.
pub fn substitute(input: &str, resolver: &impl Resolver) -> String {
  substitute_segments(&parse(input), resolver)
}

pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> String {
  let mut result = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => result.push_str(text),
      Segment::Variable(name) => match resolver.resolve(name) {
        Some(value) => result.push_str(value),
        None => {
          result.push_str("${");
          result.push_str(name);
          result.push('}');
        }
      },
    }
  }
  result
}
