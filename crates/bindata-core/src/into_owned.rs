/// Produces an owned version of borrowed data, used to detach a decoded
/// result from its source buffer's lifetime.
pub trait IntoOwned: Sized {
    type Owned: 'static;

    fn into_owned(self) -> Self::Owned;
}
