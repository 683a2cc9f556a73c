use std::{env, str::FromStr};

/// First parseable value among `keys`, or `default`.
pub fn read_env_any<T>(keys: &[&str], default: T) -> T
where
    T: FromStr,
{
    keys.iter()
        .find_map(|key| env::var(key).ok().and_then(|raw| raw.trim().parse::<T>().ok()))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_unset_or_invalid() {
        assert_eq!(read_env_any(&["LES_SIM_DEMO_UNSET_KEY"], 7usize), 7);
        assert_eq!(read_env_any::<u16>(&["PATH"], 9999), 9999);
    }
}
