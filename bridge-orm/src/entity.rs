use std::borrow::Cow;

/// A persisted domain object, as far as error reporting is concerned.
///
/// The type name is interpolated into classified error messages. Use
/// `#[derive(Entity)]` with `#[entity(name = "...")]` to give the type a
/// user-facing name; the default is the unqualified Rust type name.
pub trait Entity {
    fn type_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }
}

/// `bridge::models::Schedule<T>` -> `Schedule`.
fn short_type_name(full: &'static str) -> &'static str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Schedule;
    impl Entity for Schedule {}

    struct Wrapper<T>(T);
    impl<T> Entity for Wrapper<T> {}

    #[test]
    fn test_default_type_name_is_unqualified() {
        assert_eq!(Schedule.type_name(), "Schedule");
        assert_eq!(Wrapper(Schedule).type_name(), "Wrapper");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Organization"), "Organization");
        assert_eq!(short_type_name("Organization"), "Organization");
        assert_eq!(short_type_name("a::Page<b::Study>"), "Page");
    }
}
