/// A state that advances on typed inputs.
///
/// Transitions consume the current state and return the next one, so a
/// caller can never act on a state it has already left.
pub trait FiniteStateMachine {
    type Input;
    type Context;

    #[must_use]
    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
