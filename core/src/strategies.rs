//! proptest strategies for the data model, shared by the unit tests.

use crate::frame::{Action, ActionId, CallStack, Frame, HandlerId, ViewId};
use crate::value::{Context, Value};
use proptest::collection::{btree_map, vec};
use proptest::option;
use proptest::prelude::*;

const ID: &str = "[a-z_]{1,10}";
const KEY: &str = "[a-zA-Z0-9_.-]{1,8}";

/// Any encodable value: finite floats, a few levels of nesting.
pub(crate) fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::Float),
        ".{0,16}".prop_map(Value::Str),
    ];
    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..5).prop_map(Value::List),
            btree_map(KEY, inner, 0..5).prop_map(Value::Map),
        ]
    })
}

pub(crate) fn context() -> impl Strategy<Value = Context> {
    btree_map(KEY, value(), 0..5).prop_map(|entries| entries.into_iter().collect())
}

pub(crate) fn frame() -> impl Strategy<Value = Frame> {
    (ID, context(), option::of(ID), context()).prop_map(|(view, ctx, on_return, rctx)| {
        Frame::called(view, ctx, on_return.map(HandlerId::from), rctx)
    })
}

pub(crate) fn stack() -> impl Strategy<Value = CallStack> {
    vec(frame(), 1..6).prop_map(|frames| CallStack::from_frames(frames).unwrap())
}

pub(crate) fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Noop),
        (ID, context()).prop_map(|(action, overrides)| Action::Invoke {
            action: ActionId::from(action),
            overrides,
        }),
        (ID, context()).prop_map(|(view, context)| Action::Goto {
            view: ViewId::from(view),
            context,
        }),
        (ID, context(), option::of(ID), context()).prop_map(
            |(view, context, on_return, return_context)| Action::Call {
                view: ViewId::from(view),
                context,
                on_return: on_return.map(HandlerId::from),
                return_context,
            }
        ),
        value().prop_map(|value| Action::Return { value }),
    ]
}
