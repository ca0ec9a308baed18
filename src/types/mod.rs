pub mod base;
pub mod element;
pub mod schema;
pub mod slicing;
pub mod tagged_value;

pub use base::{BaseMember, base_member};
pub use element::{
    DefaultValue, ElementMap, ElementSpec, ElementType, FHIR_PRIMITIVE_TYPES, capitalize,
    is_complex_type_code,
};
pub use schema::TypeSchema;
pub use slicing::{Discriminator, DiscriminatorType, SliceDefinition, SlicingRules};
pub use tagged_value::{TaggedValue, UNDEFINED_TYPE};
