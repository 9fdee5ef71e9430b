use std::{fmt::Display, ops::Deref, str::FromStr};

/// (De)serializes any `FromStr + Display` value as its string form
#[derive(Clone, Debug)]
pub(crate) struct Serde<T> {
    inner: T,
}

impl<T> Serde<T> {
    pub(crate) fn new(inner: T) -> Self {
        Serde { inner }
    }
}

impl<T> AsRef<T> for Serde<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> Deref for Serde<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: FromStr> FromStr for Serde<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Serde::new)
    }
}

impl<T: Display> serde::Serialize for Serde<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.inner)
    }
}

impl<'de, T> serde::Deserialize<'de> for Serde<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;

        s.parse::<T>()
            .map(Serde::new)
            .map_err(serde::de::Error::custom)
    }
}
