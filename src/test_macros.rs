//! Test generators for the non-zero limit newtypes

/// Construction tests: `DEFAULT`, a valid value, zero rejected, equality
///
/// ```ignore
/// test_nonzero_newtype!(MaxMultiplex, 16, 128);
/// ```
#[macro_export]
macro_rules! test_nonzero_newtype {
    ($type_name:ident, $default_value:expr, $test_value:expr) => {
        #[test]
        fn test_default() {
            assert_eq!($type_name::DEFAULT.get(), $default_value);
            assert_eq!($type_name::default(), $type_name::DEFAULT);
        }

        #[test]
        fn test_new_valid() {
            let value = $type_name::new($test_value).unwrap();
            assert_eq!(value.get(), $test_value);
        }

        #[test]
        fn test_new_zero_rejected() {
            assert!($type_name::new(0).is_none());
        }

        #[test]
        fn test_equality() {
            let value = $type_name::new($test_value).unwrap();
            assert_eq!(value, $type_name::new($test_value).unwrap());
            assert_ne!(value, $type_name::DEFAULT);
        }
    };
}

/// Ordering follows the wrapped value
#[macro_export]
macro_rules! test_newtype_ordering {
    ($type_name:ident, $small_value:expr, $large_value:expr) => {
        #[test]
        fn test_ordering() {
            let small = $type_name::new($small_value).unwrap();
            let large = $type_name::new($large_value).unwrap();

            assert!(small < large);
            assert_eq!(small.cmp(&large), std::cmp::Ordering::Less);
            assert_eq!(small.max(large), large);
        }
    };
}

/// `FromStr` accepts `$valid_str` and rejects `$invalid_str`
#[macro_export]
macro_rules! test_newtype_from_str {
    ($type_name:ident, $valid_str:expr, $expected_value:expr, $invalid_str:expr) => {
        #[test]
        fn test_from_str_valid() {
            let value: $type_name = $valid_str.parse().unwrap();
            assert_eq!(value.get(), $expected_value);
        }

        #[test]
        fn test_from_str_invalid() {
            assert!($invalid_str.parse::<$type_name>().is_err());
        }
    };
}

/// All of the above for one type
///
/// ```ignore
/// test_nonzero_newtype_full!(
///     MaxConnections,
///     default: 64,
///     test_value: 8,
///     ordering: (8, 256),
///     from_str: ("32", 32, "lots")
/// );
/// ```
#[macro_export]
macro_rules! test_nonzero_newtype_full {
    (
        $type_name:ident,
        default: $default_value:expr,
        test_value: $test_value:expr,
        ordering: ($small:expr, $large:expr),
        from_str: ($valid_str:expr, $expected:expr, $invalid_str:expr)
    ) => {
        $crate::test_nonzero_newtype!($type_name, $default_value, $test_value);
        $crate::test_newtype_ordering!($type_name, $small, $large);
        $crate::test_newtype_from_str!($type_name, $valid_str, $expected, $invalid_str);
    };
}
