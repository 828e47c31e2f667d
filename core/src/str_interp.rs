use std::{borrow::Borrow, collections::BTreeMap};

/// Expands `#{name}` placeholders using `variables`.
///
/// `##` is an escaped `#`. Unknown names and an unclosed `#{` are copied
/// verbatim, so expanding never fails and expanding an already expanded
/// string is a no-op as long as no variable value contains a placeholder.
pub fn interp<K, V>(fmt: &str, variables: &BTreeMap<K, V>) -> String
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum State {
        Normal,
        HashMark,
        InsideBrace,
    }
    use State::*;

    let mut state = Normal;
    let mut res = String::with_capacity(fmt.len() * 2);
    let mut var_name = String::with_capacity(32);

    for c in fmt.chars() {
        match (c, state) {
            ('#', Normal) => {
                state = HashMark;
                res.push(c);
            }
            ('#', HashMark) => {
                state = Normal;
            }
            ('{', HashMark) => {
                state = InsideBrace;
                var_name.clear();
                res.pop(); // remove '#'
            }
            ('}', InsideBrace) => {
                state = Normal;
                match variables.get(var_name.as_str()) {
                    Some(value) => res += value.as_ref(),
                    None => {
                        res += "#{";
                        res += &var_name;
                        res.push('}');
                    }
                }
            }
            (_, InsideBrace) => {
                var_name.push(c);
            }
            _ => {
                state = Normal;
                res.push(c);
            }
        }
    }

    if state == InsideBrace {
        res += "#{";
        res += &var_name;
    }
    res
}
