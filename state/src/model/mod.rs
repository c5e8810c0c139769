//! Gateway payload types.
//!
//! These mirror the JSON the gateway delivers. Every struct decodes with
//! `#[serde(default)]` so that partial payloads (update events that only
//! carry the changed fields) still produce a value: a missing string is
//! empty, a missing list is `None`, and the engine treats both as "not
//! reported" rather than "cleared".

pub mod channel;
pub mod guild;
pub mod id;
pub mod message;
pub mod user;

pub use channel::{Channel, ChannelType, OverwriteKind, PermissionOverwrite};
pub use guild::{Emoji, Guild, Member, Role, UnavailableGuild, VoiceState};
pub use id::{AttachmentId, ChannelId, EmojiId, GuildId, MessageId, RoleId, TargetId, UserId};
pub use message::{Attachment, Embed, Message};
pub use user::{Activity, Presence, Status, User};

/// Serde helpers shared by the payload types.
pub(crate) mod de {
    use std::fmt;
    use std::marker::PhantomData;
    use std::str::FromStr;

    use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
    use serde::{Deserialize, Deserializer};

    /// Distinguishes a missing field (`None`) from an explicit `null`
    /// (`Some(None)`). Use together with `#[serde(default)]`.
    pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }

    /// Decodes `null` as the type's default instead of failing.
    pub fn null_as_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: Deserialize<'de> + Default,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
    }

    /// Integer field that also accepts a numeric string. `null`, a float,
    /// an out-of-range value or any other type decodes to zero.
    pub fn number<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<u64> + TryFrom<i64> + FromStr + Default,
        D: Deserializer<'de>,
    {
        optional_number(deserializer).map(Option::unwrap_or_default)
    }

    /// Like [`number`], but keeps "absent or unusable" as `None`.
    pub fn optional_number<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: TryFrom<u64> + TryFrom<i64> + FromStr,
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NumberVisitor(PhantomData))
    }

    /// Boolean field that also accepts `0`/`1` and `"true"`/`"false"`.
    /// Anything else decodes to `false`.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    struct NumberVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for NumberVisitor<T>
    where
        T: TryFrom<u64> + TryFrom<i64> + FromStr,
    {
        type Value = Option<T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Option<T>, E> {
            Ok(<T as TryFrom<u64>>::try_from(v).ok())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Option<T>, E> {
            Ok(<T as TryFrom<i64>>::try_from(v).ok())
        }

        fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Option<T>, E> {
            Ok(None)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Option<T>, E> {
            Ok(v.trim().parse().ok())
        }

        fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Option<T>, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<T>, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<T>, E> {
            Ok(None)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Option<T>, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Option<T>, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(None)
        }
    }

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v != 0.0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            Ok(matches!(v.trim(), "true" | "1"))
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<bool, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(false)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<bool, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(false)
        }
    }

}
