//! Turns plain transforms into instrumented pipeline stages.

use std::{convert::Infallible, future::Future};

use super::token::Token;

/// Wraps a fallible `T -> U` transform into a `Token<T> -> Token<U>` stage named `tag`.
///
/// A failing transform propagates its error and the history is not extended.
pub fn wrap<T, U, E, F>(tag: &'static str, mut transform: F) -> impl FnMut(Token<T>) -> Result<Token<U>, E>
where
    F: FnMut(T) -> Result<U, E>,
{
    move |token| {
        let (entered, value) = token.extract();
        let result = transform(value)?;
        Ok(entered.combine(tag, result))
    }
}

/// Same as [`wrap`] for transforms that cannot fail.
pub fn wrap_infallible<T, U, F>(tag: &'static str, mut transform: F) -> impl FnMut(Token<T>) -> Token<U>
where
    F: FnMut(T) -> U,
{
    let mut stage = wrap(tag, move |value| Ok::<_, Infallible>(transform(value)));
    move |token| match stage(token) {
        Ok(token) => token,
        Err(never) => match never {},
    }
}

/// Runs an asynchronous transform as a single stage.
///
/// The exit time and execution context are taken where the future completes.
pub async fn apply_async<T, U, E, F, Fut>(tag: &str, token: Token<T>, transform: F) -> Result<Token<U>, E>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    let (entered, value) = token.extract();
    let result = transform(value).await?;
    Ok(entered.combine(tag, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_stages_of_different_types() {
        let mut parse = wrap("parse", |text: &str| text.parse::<u32>());
        let mut square = wrap_infallible("square", |value: u32| value * value);
        let mut describe = wrap_infallible("describe", |value: u32| format!("#{value}"));

        let token = Token::source("source", "12");
        let token = describe(square(parse(token).unwrap()));

        assert_eq!(token.value(), "#144");
        assert_eq!(token.meta().tags(), ["source", "parse", "square", "describe"]);
        assert!(token.meta().is_consistent());
    }

    #[test]
    fn failed_stage_is_not_recorded() {
        let mut parse = wrap("parse", |text: &str| text.parse::<u32>());

        let result = parse(Token::source("source", "not a number"));
        assert!(result.is_err());
    }

    #[test]
    fn stateful_transforms_keep_their_state_between_tokens() {
        let mut counter = 0;
        let mut count = wrap_infallible("count", move |value: char| {
            counter += 1;
            (value, counter)
        });

        let _ = count(Token::source("source", 'a'));
        let token = count(Token::source("source", 'b'));
        assert_eq!(*token.value(), ('b', 2));
    }

    #[tokio::test]
    async fn async_stage_records_history() {
        let token = Token::source("source", 3u64);
        let token = apply_async("sleep", token, |value| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok::<_, Infallible>(value + 1)
        })
        .await
        .unwrap();

        let meta = token.meta();
        assert_eq!(meta.tags(), ["source", "sleep"]);
        assert!(meta.exit_times()[1] - meta.entry_times()[1] >= 20);
        assert_eq!(*token.value(), 4);
    }

    #[tokio::test]
    async fn async_stage_failure_propagates() {
        let token = Token::source("source", 3u64);
        let result: Result<Token<u64>, &str> =
            apply_async("fail", token, |_| async { Err("engine unavailable") }).await;
        assert_eq!(result.unwrap_err(), "engine unavailable");
    }
}
