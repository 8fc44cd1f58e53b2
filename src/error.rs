//! The compile error taxonomy. Every error that aborts a compile is a
//! `CompileError`; data-validation failures never are (see `model`).

use std::fmt::Display;

use kstring::KString;

/// Define an error type wrapper e.g. `Foo` around a `Box<FooKind>`,
/// with `Deref` to the kind and `From` forwarding so `?` works on
/// anything the kind converts from. Keeps `Result<T, Foo>` small.
#[macro_export]
macro_rules! def_boxed_error {
    ($wrappername:ident, $kindname:ident) => {
        #[derive(Debug)]
        pub struct $wrappername(Box<$kindname>);

        impl std::ops::Deref for $wrappername {
            type Target = $kindname;

            fn deref(&self) -> &Self::Target {
                &*self.0
            }
        }

        impl<E> From<E> for $wrappername where $kindname: From<E> {
            fn from(err: E) -> Self {
                $wrappername(Box::new($kindname::from(err)))
            }
        }

        impl std::error::Error for $wrappername {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                self.0.source()
            }
        }

        impl std::fmt::Display for $wrappername {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&*self.0, f)
            }
        }
    }
}

/// Defines both an error kind (deriving `thiserror::Error`) and its
/// box wrapper as per `def_boxed_error`.
#[macro_export]
macro_rules! def_boxed_thiserror {
    ($wrappername:ident, pub enum $kindname:ident {$($body:tt)*}) => {
        #[derive(thiserror::Error, Debug)]
        pub enum $kindname {
            $($body)*
        }

        $crate::def_boxed_error!($wrappername, $kindname);
    };
}


/// Where in a template a tag starts. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: KString,
    pub line: u32,
    pub column: u32,
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "template {:?} line {} character {}",
               self.file.as_str(), self.line, self.column)
    }
}

/// Identifies the offending tag of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub namespace: KString,
    pub name: KString,
    pub location: Location,
}

impl Display for TagRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}:{}> in {}", self.namespace, self.name, self.location)
    }
}

def_boxed_thiserror!(CompileError, pub enum CompileErrorKind {
    #[error("unknown tag {0}")]
    UnknownTag(TagRef),
    #[error("invalid closing tag {0}: closing tags cannot self-close")]
    MalformedTag(TagRef),
    #[error("unexpected closing tag {0}")]
    UnexpectedClosingTag(TagRef),
    #[error("expecting closing tag for {expected}, found closing tag {found}")]
    MismatchedClosingTag { expected: TagRef, found: TagRef },
    #[error("missing closing tag for {0}")]
    UnterminatedTag(TagRef),
    #[error("tag {tag} is missing \"{attribute}\" attribute")]
    MissingAttribute { tag: TagRef, attribute: KString },
    #[error("tag {0} is missing a comparison attribute")]
    MissingComparison(TagRef),
    #[error("tag {0} has an invalid value for attribute \"{1}\": {2}")]
    InvalidAttribute(TagRef, KString, String),
    #[error("form {form} already has a field with the id \"{id}\"")]
    DuplicateFieldId { form: TagRef, id: KString },
    #[error("tag {0} must have a parent <form:form> tag")]
    FieldOutsideForm(TagRef),
    #[error("tag {0} cannot have a parent <form:form> tag")]
    NestedForm(TagRef),
    #[error("form {tag} expects non-existent base type \"{base}\"")]
    UnknownBaseType { tag: TagRef, base: KString },
    #[error("invalid expression {source_text:?} in {location}: {message}")]
    Expression { location: Location, source_text: String, message: String },
    #[error("tag file {0:?} does not follow the naming convention")]
    NamingConvention(String),
    #[error("tag file {0:?} does not resolve to a tag implementation {1:?}")]
    MissingImplementation(String, String),
    #[error("unbalanced static subtrees in template \"{0}\" (skip counter {1} at end)")]
    UnbalancedSkip(KString, u32),
    #[error("{context}: {error}")]
    Io { context: String, error: std::io::Error },
});

impl CompileError {
    pub fn kind(&self) -> &CompileErrorKind {
        self
    }

    /// The tag an error is about, if it is about one.
    pub fn tag(&self) -> Option<&TagRef> {
        use CompileErrorKind::*;
        match self.kind() {
            UnknownTag(t) | MalformedTag(t) | UnexpectedClosingTag(t)
                | UnterminatedTag(t) | MissingComparison(t)
                | InvalidAttribute(t, _, _) | FieldOutsideForm(t) | NestedForm(t) => Some(t),
            MismatchedClosingTag { found, .. } => Some(found),
            MissingAttribute { tag, .. } | UnknownBaseType { tag, .. } => Some(tag),
            DuplicateFieldId { form, .. } => Some(form),
            Expression { .. } | NamingConvention(_) | MissingImplementation(_, _)
                | UnbalancedSkip(_, _) | Io { .. } => None,
        }
    }

    pub(crate) fn io(context: String, error: std::io::Error) -> Self {
        CompileErrorKind::Io { context, error }.into()
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
