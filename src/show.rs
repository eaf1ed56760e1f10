use itertools::Itertools;

/// Compact rendering used in log messages and debug tables. States print as `q3`, tree nodes
/// as `n7`, and traces as their concatenated symbols, with `ε` for the empty trace.
pub trait Show {
    fn show(&self) -> String;
}

/// Renders the time a refinement or a whole learning run took, using the two most significant
/// units (`2m 5s`, `1s 500ms`, `15us`).
pub fn show_duration(duration: std::time::Duration) -> String {
    let us = duration.as_micros();
    let ms = duration.as_millis();
    let s = duration.as_secs();
    let m = s / 60;

    if m > 0 {
        format!("{}m {}s", m, s % 60)
    } else if s > 0 {
        format!("{}s {}ms", s, ms % 1000)
    } else if ms > 0 {
        format!("{}ms {}us", ms, us % 1000)
    } else {
        format!("{}us", us)
    }
}

macro_rules! impl_show_to_string {
    ($($ty:ty),*) => {
        $(impl Show for $ty {
            fn show(&self) -> String {
                self.to_string()
            }
        })*
    };
}

impl_show_to_string!(char, bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, String, &str);

impl<S: Show> Show for [S] {
    fn show(&self) -> String {
        if self.is_empty() {
            return "ε".to_string();
        }
        self.iter().map(|x| x.show()).join("")
    }
}

impl<S: Show> Show for Vec<S> {
    fn show(&self) -> String {
        self.as_slice().show()
    }
}

impl<S: Show> Show for Option<S> {
    fn show(&self) -> String {
        match self {
            None => "-".to_string(),
            Some(x) => x.show(),
        }
    }
}

impl<L: Show, R: Show> Show for (L, R) {
    fn show(&self) -> String {
        format!("{}/{}", self.0.show(), self.1.show())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_concatenated() {
        assert_eq!(vec!['a', 'b', 'a'].show(), "aba");
        assert_eq!(Vec::<char>::new().show(), "ε");
        assert_eq!((vec!['a'], vec![1u8]).show(), "a/1");
    }

    #[test]
    fn durations() {
        assert_eq!(show_duration(std::time::Duration::from_micros(15)), "15us");
        assert_eq!(show_duration(std::time::Duration::from_millis(1500)), "1s 500ms");
        assert_eq!(show_duration(std::time::Duration::from_secs(125)), "2m 5s");
    }
}
