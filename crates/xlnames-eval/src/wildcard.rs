//! Excel wildcard patterns: `*` matches any run of characters, `?` exactly
//! one, and `~` makes the next `*`, `?` or `~` literal. Matching is
//! case-insensitive and covers the whole text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Star,
    One,
    Lit(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    pieces: Vec<Piece>,
}

fn fold(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase()
}

impl Wildcard {
    pub fn new(pattern: &str) -> Self {
        let mut pieces = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '~' => match chars.peek() {
                    Some(&next @ ('*' | '?' | '~')) => {
                        chars.next();
                        pieces.push(Piece::Lit(next));
                    }
                    _ => pieces.push(Piece::Lit('~')),
                },
                '*' => {
                    if pieces.last() != Some(&Piece::Star) {
                        pieces.push(Piece::Star);
                    }
                }
                '?' => pieces.push(Piece::One),
                other => pieces.extend(fold(other).map(Piece::Lit)),
            }
        }
        Self { pieces }
    }

    /// Whether the pattern contains an unescaped `*` or `?`.
    pub fn has_wildcards(&self) -> bool {
        self.pieces.iter().any(|p| !matches!(p, Piece::Lit(_)))
    }

    pub fn is_match(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().flat_map(fold).collect();
        let pieces = &self.pieces;

        let (mut p, mut t) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;
        while t < text.len() {
            match pieces.get(p) {
                Some(Piece::One) => {
                    p += 1;
                    t += 1;
                }
                Some(Piece::Lit(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                Some(Piece::Star) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                _ => match backtrack {
                    Some((star, mark)) => {
                        p = star + 1;
                        t = mark + 1;
                        backtrack = Some((star, mark + 1));
                    }
                    None => return false,
                },
            }
        }
        pieces[p..].iter().all(|piece| *piece == Piece::Star)
    }
}
