//! Arabic-script contextual shaping and bidi reordering for PDF output.
//!
//! The writer draws glyphs strictly left to right, so text must reach it
//! already in presentation forms and in visual order.

use unicode_bidi::{BidiInfo, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Joins on both sides
    Dual,
    /// Joins only to the preceding (right-hand) letter
    Right,
    /// Tatweel: forces joins on both neighbours, has no forms of its own
    Causing,
}

impl Joining {
    const fn joins_following(self) -> bool {
        matches!(self, Self::Dual | Self::Causing)
    }
}

/// Presentation forms for one letter: isolated, final, initial, medial.
#[derive(Debug, Clone, Copy)]
struct Forms {
    isolated: char,
    final_: char,
    initial: Option<char>,
    medial: Option<char>,
}

const fn right(isolated: char, final_: char) -> Forms {
    Forms {
        isolated,
        final_,
        initial: None,
        medial: None,
    }
}

const fn dual(isolated: char, final_: char, initial: char, medial: char) -> Forms {
    Forms {
        isolated,
        final_,
        initial: Some(initial),
        medial: Some(medial),
    }
}

fn forms(c: char) -> Option<Forms> {
    let f = match c {
        '\u{0622}' => right('\u{FE81}', '\u{FE82}'),
        '\u{0623}' => right('\u{FE83}', '\u{FE84}'),
        '\u{0624}' => right('\u{FE85}', '\u{FE86}'),
        '\u{0625}' => right('\u{FE87}', '\u{FE88}'),
        '\u{0626}' => dual('\u{FE89}', '\u{FE8A}', '\u{FE8B}', '\u{FE8C}'),
        '\u{0627}' => right('\u{FE8D}', '\u{FE8E}'),
        '\u{0628}' => dual('\u{FE8F}', '\u{FE90}', '\u{FE91}', '\u{FE92}'),
        '\u{0629}' => right('\u{FE93}', '\u{FE94}'),
        '\u{062A}' => dual('\u{FE95}', '\u{FE96}', '\u{FE97}', '\u{FE98}'),
        '\u{062B}' => dual('\u{FE99}', '\u{FE9A}', '\u{FE9B}', '\u{FE9C}'),
        '\u{062C}' => dual('\u{FE9D}', '\u{FE9E}', '\u{FE9F}', '\u{FEA0}'),
        '\u{062D}' => dual('\u{FEA1}', '\u{FEA2}', '\u{FEA3}', '\u{FEA4}'),
        '\u{062E}' => dual('\u{FEA5}', '\u{FEA6}', '\u{FEA7}', '\u{FEA8}'),
        '\u{062F}' => right('\u{FEA9}', '\u{FEAA}'),
        '\u{0630}' => right('\u{FEAB}', '\u{FEAC}'),
        '\u{0631}' => right('\u{FEAD}', '\u{FEAE}'),
        '\u{0632}' => right('\u{FEAF}', '\u{FEB0}'),
        '\u{0633}' => dual('\u{FEB1}', '\u{FEB2}', '\u{FEB3}', '\u{FEB4}'),
        '\u{0634}' => dual('\u{FEB5}', '\u{FEB6}', '\u{FEB7}', '\u{FEB8}'),
        '\u{0635}' => dual('\u{FEB9}', '\u{FEBA}', '\u{FEBB}', '\u{FEBC}'),
        '\u{0636}' => dual('\u{FEBD}', '\u{FEBE}', '\u{FEBF}', '\u{FEC0}'),
        '\u{0637}' => dual('\u{FEC1}', '\u{FEC2}', '\u{FEC3}', '\u{FEC4}'),
        '\u{0638}' => dual('\u{FEC5}', '\u{FEC6}', '\u{FEC7}', '\u{FEC8}'),
        '\u{0639}' => dual('\u{FEC9}', '\u{FECA}', '\u{FECB}', '\u{FECC}'),
        '\u{063A}' => dual('\u{FECD}', '\u{FECE}', '\u{FECF}', '\u{FED0}'),
        '\u{0641}' => dual('\u{FED1}', '\u{FED2}', '\u{FED3}', '\u{FED4}'),
        '\u{0642}' => dual('\u{FED5}', '\u{FED6}', '\u{FED7}', '\u{FED8}'),
        '\u{0643}' => dual('\u{FED9}', '\u{FEDA}', '\u{FEDB}', '\u{FEDC}'),
        '\u{0644}' => dual('\u{FEDD}', '\u{FEDE}', '\u{FEDF}', '\u{FEE0}'),
        '\u{0645}' => dual('\u{FEE1}', '\u{FEE2}', '\u{FEE3}', '\u{FEE4}'),
        '\u{0646}' => dual('\u{FEE5}', '\u{FEE6}', '\u{FEE7}', '\u{FEE8}'),
        '\u{0647}' => dual('\u{FEE9}', '\u{FEEA}', '\u{FEEB}', '\u{FEEC}'),
        '\u{0648}' => right('\u{FEED}', '\u{FEEE}'),
        '\u{0649}' => dual('\u{FEEF}', '\u{FEF0}', '\u{FBE8}', '\u{FBE9}'),
        '\u{064A}' => dual('\u{FEF1}', '\u{FEF2}', '\u{FEF3}', '\u{FEF4}'),
        // Persian additions
        '\u{067E}' => dual('\u{FB56}', '\u{FB57}', '\u{FB58}', '\u{FB59}'),
        '\u{0686}' => dual('\u{FB7A}', '\u{FB7B}', '\u{FB7C}', '\u{FB7D}'),
        '\u{0698}' => right('\u{FB8A}', '\u{FB8B}'),
        '\u{06A9}' => dual('\u{FB8E}', '\u{FB8F}', '\u{FB90}', '\u{FB91}'),
        '\u{06AF}' => dual('\u{FB92}', '\u{FB93}', '\u{FB94}', '\u{FB95}'),
        '\u{06C0}' => right('\u{FBA4}', '\u{FBA5}'),
        '\u{06CC}' => dual('\u{FBFC}', '\u{FBFD}', '\u{FBFE}', '\u{FBFF}'),
        _ => return None,
    };
    Some(f)
}

fn joining(c: char) -> Option<Joining> {
    if c == '\u{0640}' {
        return Some(Joining::Causing);
    }
    forms(c).map(|f| {
        if f.initial.is_some() {
            Joining::Dual
        } else {
            Joining::Right
        }
    })
}

/// Lam-alef ligature (isolated, final) for the alef following a lam.
const fn lam_alef(alef: char) -> Option<(char, char)> {
    match alef {
        '\u{0622}' => Some(('\u{FEF5}', '\u{FEF6}')),
        '\u{0623}' => Some(('\u{FEF7}', '\u{FEF8}')),
        '\u{0625}' => Some(('\u{FEF9}', '\u{FEFA}')),
        '\u{0627}' => Some(('\u{FEFB}', '\u{FEFC}')),
        _ => None,
    }
}

/// Combining marks dropped before shaping (harakat, Quranic annotations).
const fn is_harakah(c: char) -> bool {
    matches!(c,
        '\u{0610}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06DC}'
        | '\u{06DF}'..='\u{06E4}'
        | '\u{06E7}'..='\u{06E8}'
        | '\u{06EA}'..='\u{06ED}')
}

/// Replace Arabic letters with their contextual presentation forms.
///
/// Output stays in logical order.
pub fn reshape(text: &str) -> String {
    let chars: Vec<char> = text.chars().filter(|&c| !is_harakah(c)).collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let Some(kind) = joining(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let joins_prev = i > 0 && joining(chars[i - 1]).is_some_and(Joining::joins_following);

        if c == '\u{0644}'
            && let Some((isolated, final_)) = chars.get(i + 1).and_then(|&n| lam_alef(n))
        {
            out.push(if joins_prev { final_ } else { isolated });
            i += 2;
            continue;
        }

        if kind == Joining::Causing {
            out.push(c);
            i += 1;
            continue;
        }

        let joins_next =
            kind.joins_following() && chars.get(i + 1).is_some_and(|&n| joining(n).is_some());

        let Some(f) = forms(c) else {
            out.push(c);
            i += 1;
            continue;
        };
        let shaped = match (joins_prev, joins_next) {
            (true, true) => f.medial.unwrap_or(f.final_),
            (true, false) => f.final_,
            (false, true) => f.initial.unwrap_or(f.isolated),
            (false, false) => f.isolated,
        };
        out.push(shaped);
        i += 1;
    }

    out
}

const fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        '‹' => '›',
        '›' => '‹',
        other => other,
    }
}

/// Reorder one line from logical to visual order with an RTL base direction.
pub fn visual_order(line: &str) -> String {
    if line.is_empty() {
        return String::new();
    }

    let info = BidiInfo::new(line, Some(Level::rtl()));
    let mut out = String::with_capacity(line.len());

    for para in &info.paragraphs {
        let range = para.range.clone();
        let (levels, runs) = info.visual_runs(para, range);
        for run in runs {
            let text = &line[run.clone()];
            if levels[run.start].is_rtl() {
                out.extend(text.chars().rev().map(mirror));
            } else {
                out.push_str(text);
            }
        }
    }

    out
}

/// Shape and reorder each line of `text`, keeping line breaks.
pub fn shape_rtl(text: &str) -> String {
    text.split('\n')
        .map(|line| visual_order(&reshape(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_initial_and_final() {
        // beh + alef
        assert_eq!(reshape("با"), "\u{FE91}\u{FE8E}");
    }

    #[test]
    fn test_reshape_isolated_letters() {
        assert_eq!(reshape("ب"), "\u{FE8F}");
        // dal never joins forward, so the following reh stays isolated
        assert_eq!(reshape("در"), "\u{FEA9}\u{FEAD}");
    }

    #[test]
    fn test_reshape_medial() {
        // beh beh beh
        assert_eq!(reshape("ببب"), "\u{FE91}\u{FE92}\u{FE90}");
    }

    #[test]
    fn test_reshape_lam_alef_ligature() {
        // seen + lam-alef + meem
        assert_eq!(reshape("سلام"), "\u{FEB3}\u{FEFC}\u{FEE1}");
        assert_eq!(reshape("لا"), "\u{FEFB}");
    }

    #[test]
    fn test_reshape_persian_letters() {
        // peh + keheh + farsi yeh
        assert_eq!(reshape("پکی"), "\u{FB58}\u{FB91}\u{FBFD}");
    }

    #[test]
    fn test_reshape_drops_harakat() {
        assert_eq!(reshape("بَا"), reshape("با"));
    }

    #[test]
    fn test_reshape_leaves_latin_alone() {
        assert_eq!(reshape("abc 123"), "abc 123");
    }

    #[test]
    fn test_visual_order_reverses_rtl() {
        let shaped = reshape("سلام");
        let visual = visual_order(&shaped);
        assert_eq!(visual, "\u{FEE1}\u{FEFC}\u{FEB3}");
    }

    #[test]
    fn test_visual_order_keeps_ltr_runs() {
        let visual = visual_order(&reshape("سلام hello"));
        assert!(visual.starts_with("hello"));
        assert!(visual.ends_with('\u{FEB3}'));
    }

    #[test]
    fn test_visual_order_mirrors_brackets() {
        let visual = visual_order(&reshape("(سلام)"));
        assert!(visual.starts_with('('));
        assert!(visual.ends_with(')'));
    }

    #[test]
    fn test_shape_rtl_keeps_lines() {
        let shaped = shape_rtl("با\nبا");
        assert_eq!(shaped.lines().count(), 2);
    }
}
