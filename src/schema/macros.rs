/// Implements [`Destination`](crate::Destination) and [`Element`](crate::Element)
/// for a record type and for `Box` of it.
///
/// [`record!`](crate::record) calls this itself; use it directly only when
/// [`Record`](crate::Record) is implemented by hand.
#[macro_export]
macro_rules! record_shapes {
    ($ty:ty) => {
        impl $crate::Destination for $ty {
            fn target(&mut self) -> $crate::Result<$crate::Target<'_>> {
                Ok($crate::Target::Record(self))
            }
        }

        impl $crate::Destination for ::std::boxed::Box<$ty> {
            fn target(&mut self) -> $crate::Result<$crate::Target<'_>> {
                Ok($crate::Target::Record(&mut **self))
            }
        }

        impl $crate::Element for $ty {
            type Record = $ty;
            const INDIRECT: bool = false;

            fn wrap(record: $ty) -> Self {
                record
            }

            fn record_mut(&mut self) -> &mut $ty {
                self
            }
        }

        impl $crate::Element for ::std::boxed::Box<$ty> {
            type Record = $ty;
            const INDIRECT: bool = true;

            fn wrap(record: $ty) -> Self {
                ::std::boxed::Box::new(record)
            }

            fn record_mut(&mut self) -> &mut $ty {
                self
            }
        }
    };
}

/// Implements [`Record`](crate::Record) for a struct and wires up its
/// destination shapes.
///
/// ```ignore
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// penumbra::record! {
///     User => "users" {
///         id [primary_key],
///         name,
///         email as "email_address",
///     }
///     after_find = User::normalize;
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $ty:ident => $table:literal {
            $( $field:ident $( as $column:literal )? $( [$flag:ident] )? ),* $(,)?
        }
        $( after_find = $hook:path ; )?
    ) => {
        impl $crate::Record for $ty {
            $(
                const AFTER_FIND: ::std::option::Option<$crate::AfterFindFn<Self>> =
                    ::std::option::Option::Some($hook);
            )?

            fn describe() -> $crate::ModelBuilder {
                let builder = $crate::ModelBuilder::new($table);
                $(
                    let builder = $crate::__record_field!(builder, $field $(, $column)?);
                    $( let builder = builder.$flag(); )?
                )*
                builder
            }

            fn slots(&mut self) -> ::std::vec::Vec<&mut dyn $crate::ColumnSlot> {
                ::std::vec![$( &mut self.$field as &mut dyn $crate::ColumnSlot ),*]
            }
        }

        $crate::record_shapes!($ty);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_field {
    ($builder:ident, $field:ident) => {
        $builder.field(stringify!($field))
    };
    ($builder:ident, $field:ident, $column:literal) => {
        $builder.column(stringify!($field), $column)
    };
}
