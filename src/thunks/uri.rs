//! # Endpoint naming.
//!
//! [`Thunks::uri`] declares one effect per HTTP method under a shared name:
//!
//! ```text
//! uri(["/users"])                  .get()  ─► "/users [GET]"
//! uri(["/users/:id", "by-id"])     .put()  ─► "/users/:id [PUT] by-id"
//! uri(["/a", "x", "y"])            .post() ─► "/a [POST] x|y"
//! ```

use std::fmt;

use crate::error::RuntimeError;
use crate::thunks::context::ThunkCtx;
use crate::thunks::creator::{ActionCreator, Declare};
use crate::thunks::registry::Thunks;

/// HTTP method tag embedded in endpoint names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`.
    Get,
    /// `POST`.
    Post,
    /// `PUT`.
    Put,
    /// `PATCH`.
    Patch,
    /// `DELETE`.
    Delete,
    /// `OPTIONS`.
    Options,
    /// `HEAD`.
    Head,
    /// `CONNECT`.
    Connect,
    /// `TRACE`.
    Trace,
}

impl Method {
    /// Upper-case tag used in effect names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint builder returned by [`Thunks::uri`].
pub struct Uri<'t, C: ThunkCtx> {
    thunks: &'t Thunks<C>,
    name: String,
    remainder: String,
}

impl<C: ThunkCtx> fmt::Debug for Uri<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uri")
            .field("name", &self.name)
            .field("remainder", &self.remainder)
            .finish()
    }
}

impl<C: ThunkCtx> Thunks<C> {
    /// Starts an endpoint named by `parts[0]`, qualified by the rest.
    ///
    /// # Errors
    /// [`RuntimeError::EmptyName`] for no parts or an empty first part.
    pub fn uri<I>(&self, parts: I) -> Result<Uri<'_, C>, RuntimeError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut parts = parts.into_iter().map(Into::into);
        let name = parts.next().filter(|n| !n.is_empty()).ok_or(RuntimeError::EmptyName)?;
        let rest: Vec<String> = parts.collect();
        let remainder = if rest.is_empty() {
            String::new()
        } else {
            format!(" {}", rest.join("|"))
        };
        Ok(Uri {
            thunks: self,
            name,
            remainder,
        })
    }
}

impl<C: ThunkCtx> Uri<'_, C> {
    /// Effect name for `method`.
    pub fn name_for(&self, method: Method) -> String {
        format!("{} [{method}]{}", self.name, self.remainder)
    }

    /// Declares the endpoint for `method`.
    pub fn method(
        &self,
        method: Method,
        decl: impl Into<Declare<C>>,
    ) -> Result<ActionCreator<C>, RuntimeError> {
        self.thunks.create(self.name_for(method), decl)
    }

    /// Declares the `GET` endpoint.
    pub fn get(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Get, decl)
    }

    /// Declares the `POST` endpoint.
    pub fn post(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Post, decl)
    }

    /// Declares the `PUT` endpoint.
    pub fn put(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Put, decl)
    }

    /// Declares the `PATCH` endpoint.
    pub fn patch(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Patch, decl)
    }

    /// Declares the `DELETE` endpoint.
    pub fn delete(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Delete, decl)
    }

    /// Declares the `OPTIONS` endpoint.
    pub fn options(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Options, decl)
    }

    /// Declares the `HEAD` endpoint.
    pub fn head(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Head, decl)
    }

    /// Declares the `CONNECT` endpoint.
    pub fn connect(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Connect, decl)
    }

    /// Declares the `TRACE` endpoint.
    pub fn trace(&self, decl: impl Into<Declare<C>>) -> Result<ActionCreator<C>, RuntimeError> {
        self.method(Method::Trace, decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thunks::Context;

    #[test]
    fn names_follow_the_endpoint_template() {
        let thunks: Thunks<Context> = Thunks::new();
        let users = thunks.uri(["/users"]).unwrap();
        assert_eq!(users.get(()).unwrap().name(), "/users [GET]");
        assert_eq!(users.post(()).unwrap().name(), "/users [POST]");

        let by_id = thunks.uri(["/users/:id", "by-id"]).unwrap();
        assert_eq!(by_id.put(()).unwrap().name(), "/users/:id [PUT] by-id");

        let multi = thunks.uri(["/a", "x", "y"]).unwrap();
        assert_eq!(multi.name_for(Method::Trace), "/a [TRACE] x|y");
    }

    #[test]
    fn every_method_is_tagged() {
        let thunks: Thunks<Context> = Thunks::new();
        let api = thunks.uri(["/r"]).unwrap();
        let names: Vec<String> = [
            api.get(()),
            api.post(()),
            api.put(()),
            api.patch(()),
            api.delete(()),
            api.options(()),
            api.head(()),
            api.connect(()),
            api.trace(()),
        ]
        .into_iter()
        .map(|c| c.unwrap().name().to_string())
        .collect();
        assert_eq!(names[4], "/r [DELETE]");
        assert_eq!(names[8], "/r [TRACE]");
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn empty_parts_are_rejected() {
        let thunks: Thunks<Context> = Thunks::new();
        assert_eq!(
            thunks.uri(Vec::<String>::new()).unwrap_err(),
            RuntimeError::EmptyName
        );
        assert_eq!(thunks.uri([""]).unwrap_err(), RuntimeError::EmptyName);
    }
}
