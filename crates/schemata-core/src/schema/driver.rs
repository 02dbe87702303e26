use super::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, ForeignKeyConstraintMethods,
    IndexMethods, PrimaryKeyConstraintMethods, SchemaMethods, TableMethods,
    UniqueConstraintMethods, ViewMethods,
};

/// Every schema operation for one dialect. Implemented for any type that
/// provides all the per-kind traits; drivers only write the
/// [`DialectSchema`](super::DialectSchema) hooks and empty impl blocks.
pub trait SchemaDriver:
    SchemaMethods
    + TableMethods
    + ColumnMethods
    + IndexMethods
    + CheckConstraintMethods
    + DefaultConstraintMethods
    + UniqueConstraintMethods
    + ForeignKeyConstraintMethods
    + PrimaryKeyConstraintMethods
    + ViewMethods
{
}

impl<T> SchemaDriver for T where
    T: SchemaMethods
        + TableMethods
        + ColumnMethods
        + IndexMethods
        + CheckConstraintMethods
        + DefaultConstraintMethods
        + UniqueConstraintMethods
        + ForeignKeyConstraintMethods
        + PrimaryKeyConstraintMethods
        + ViewMethods
        + ?Sized
{
}
