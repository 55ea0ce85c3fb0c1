use gloo_timers::callback::Timeout;
use race_query::session::Notice;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use web_sys::HtmlInputElement;
use yew::prelude::*;

/// A page session shared between the component and its async tasks.
///
/// Mutations go through [`SessionHandle::update`], which re-renders the
/// component afterwards. Async drivers borrow the cell themselves and call
/// [`SessionHandle::refresh`] once they are done.
pub struct SessionHandle<S> {
    cell: Rc<RefCell<S>>,
    refresh: UseForceUpdateHandle,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

impl<S> SessionHandle<S> {
    pub fn borrow(&self) -> Ref<'_, S> {
        self.cell.borrow()
    }

    pub fn cell(&self) -> Rc<RefCell<S>> {
        self.cell.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut S)) {
        f(&mut self.cell.borrow_mut());
        self.refresh.force_update();
    }

    pub fn refresh(&self) {
        self.refresh.force_update();
    }
}

#[hook]
pub fn use_session<S, F>(init: F) -> SessionHandle<S>
where
    S: 'static,
    F: FnOnce() -> S,
{
    let cell = use_mut_ref(init);
    let refresh = use_force_update();
    SessionHandle { cell, refresh }
}

/// Close `notice` once its display time has passed.
///
/// The timer is dropped, and so cancelled, when a newer notice replaces it.
#[hook]
pub fn use_notice_expiry(notice: Option<Notice>, expire: Callback<u64>) {
    let key = notice.map(|n| (n.id, n.kind.duration_ms()));
    use_effect_with(key, move |key| {
        let timer = (*key).map(|(id, ms)| Timeout::new(ms, move || expire.emit(id)));
        move || drop(timer)
    });
}

/// Holds the state and callbacks for a validated text input.
#[derive(Clone)]
pub struct ValidatedInput {
    /// The current text content of the input field.
    pub text: String,
    /// An optional error message if parsing failed.
    pub error: Option<String>,
    pub on_text_input: Callback<InputEvent>,
    /// Parse the current text and hand the value on.
    pub on_commit: Callback<()>,
}

/// Text input whose parsed value is pushed into `on_value` on commit.
#[hook]
pub fn use_validated_input<T: 'static>(
    initial_text: String,
    parse: Rc<dyn Fn(&str) -> Result<T, String>>,
    on_value: Callback<T>,
) -> ValidatedInput {
    let text = use_state(move || initial_text);
    let error = use_state(|| None::<String>);

    let on_text_input = {
        let text = text.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            text.set(input.value());
        })
    };

    let on_commit = {
        let text = text.clone();
        let error = error.clone();
        Callback::from(move |_| match parse(&text) {
            Ok(value) => {
                error.set(None);
                on_value.emit(value);
            }
            Err(msg) => error.set(Some(msg)),
        })
    };

    ValidatedInput {
        text: (*text).clone(),
        error: (*error).clone(),
        on_text_input,
        on_commit,
    }
}
