use super::{ParseTreeListener, RuleEvent};
use crate::runtime::{NativeChild, NativeParseResult, RuleContext};

enum Frame<'a> {
    Enter(&'a RuleContext),
    Exit(&'a RuleContext),
    Terminal(usize),
}

/// Drives a listener over a native result depth-first
pub struct ParseTreeWalker;

impl ParseTreeWalker {
    /// Walk the result's root; returns false when there is no root
    pub fn walk(listener: &mut dyn ParseTreeListener, result: &NativeParseResult) -> bool {
        listener.reset();
        let Some(root) = result.root.as_ref() else {
            return false;
        };

        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(ctx) => {
                    listener.enter_rule(&event(result, ctx));
                    stack.push(Frame::Exit(ctx));
                    for child in ctx.children.iter().rev() {
                        stack.push(match child {
                            NativeChild::Rule(nested) => Frame::Enter(nested),
                            NativeChild::Terminal(index) => Frame::Terminal(*index),
                        });
                    }
                }
                Frame::Exit(ctx) => listener.exit_rule(&event(result, ctx)),
                Frame::Terminal(index) => {
                    if let Some(token) = result.token(index) {
                        listener.visit_terminal(token, &result.symbol(token));
                    }
                }
            }
        }
        true
    }
}

fn event<'a>(result: &'a NativeParseResult, ctx: &'a RuleContext) -> RuleEvent<'a> {
    let start = result.token(ctx.start).map_or(0, |t| t.start);
    let end = ctx
        .stop
        .and_then(|stop| result.token(stop))
        .map_or(start, |t| t.end);
    RuleEvent {
        name: result.rule_name(ctx.rule_index).unwrap_or("<unknown>"),
        context: ctx,
        start,
        end,
    }
}
