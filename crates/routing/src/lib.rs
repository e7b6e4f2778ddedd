//! Turn a raw chat message into a routed, resolved command invocation.
//!
//! Pipeline:
//! 1. [`tokenize`] splits the text into flags and positional tokens and
//!    strips the bot address.
//! 2. [`resolve_all`] turns positional tokens into [`ResolvedValue`]s,
//!    fetching mentioned users, roles and channels concurrently.
//! 3. [`RouteTable::dispatch`] walks the route tree and invokes the matched
//!    [`RouteHandler`] with an [`InvocationContext`].
//!
//! Route tables are assembled once at startup and are read-only afterwards.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod mention;
pub mod parser;
pub mod table;
pub mod tokenizer;

pub use {
    context::{Flags, Identity, IdentityView, InvocationContext},
    dispatch::Dispatched,
    error::{Audience, Error, Result},
    handler::{FnHandler, HandlerResult, InitHook, RouteHandler, handler_fn},
    mention::{ResolvedValue, TypeTag, resolve_all, resolve_token},
    parser::CommandParser,
    table::{RouteKey, RouteNode, RouteTable},
    tokenizer::{AddressMatcher, Tokens, is_flag, tokenize},
};
