/// A function with memory: a unary transform that exclusively owns its state.
///
/// Agents are plain values. They are driven through `apply` by whoever owns
/// them and can be wrapped by [`super::stage::wrap_infallible`] like any
/// other transform, e.g. `wrap_infallible("capture", move |x| agent.apply(x))`.
pub trait Agent {
    type Input;
    type Output;
    type State;

    fn apply(&mut self, input: Self::Input) -> Self::Output;

    /// Current state, for inspection while the agent is still running.
    fn state(&self) -> &Self::State;

    /// Consumes the agent, returning its final state.
    fn finish(self) -> Self::State;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{stage::wrap_infallible, token::Token};

    struct RunningSum {
        total: i64,
    }

    impl Agent for RunningSum {
        type Input = i64;
        type Output = i64;
        type State = i64;

        fn apply(&mut self, input: i64) -> i64 {
            self.total += input;
            self.total
        }

        fn state(&self) -> &i64 {
            &self.total
        }

        fn finish(self) -> i64 {
            self.total
        }
    }

    #[test]
    fn agent_runs_inside_a_stage() {
        let mut agent = RunningSum { total: 0 };
        {
            let mut stage = wrap_infallible("sum", |value| agent.apply(value));
            let _ = stage(Token::source("source", 2));
            let token = stage(Token::source("source", 5));
            assert_eq!(*token.value(), 7);
        }

        assert_eq!(*agent.state(), 7);
        assert_eq!(agent.finish(), 7);
    }
}
