//! Shorthand for effects

/// Wrap an async block as an `Effect::Future`
///
/// The block evaluates to `Option<Action>` and captures by move.
///
/// ```rust,ignore
/// use matchday_core::async_effect;
///
/// let api = Arc::clone(&env.api);
/// async_effect! {
///     match api.event_detail(event_id).await {
///         Ok(detail) => Some(CheckoutAction::EventLoaded { detail }),
///         Err(error) => Some(CheckoutAction::EventLoadFailed { error }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move { $($body)* }))
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;

    #[tokio::test]
    async fn test_block_becomes_future_effect() {
        let seat_count = 3;
        let effect: Effect<u32> = async_effect! { Some(seat_count * 2) };

        let Effect::Future(fut) = effect else {
            unreachable!("async_effect! builds a future");
        };
        assert_eq!(fut.await, Some(6));
    }
}
