//! The iteration protocol and generator resumption.

use super::{Completion, Frame, Vm};
use crate::{
    exception_private::{ExcType, RunError, RunResult},
    types::{GeneratorState, NativeIter},
    value::{ObjectData, Value},
};

fn stopped() -> RunError {
    ExcType::IteratorStopped.msg("iteration stopped")
}

impl Vm<'_> {
    /// Returns an iterator over `value`: iterators and generators are their
    /// own iterators, anything else goes through `op_iter`.
    pub fn get_iterator(&mut self, value: Value) -> RunResult<Value> {
        if matches!(self.heap.data(value), ObjectData::Iterator(_) | ObjectData::Generator(_)) {
            return Ok(value);
        }
        self.call_operator("op_iter", vec![value], false)
    }

    /// Advances an iterator, raising `IteratorStopped` once it is exhausted.
    ///
    /// Objects other than native iterators and generators are advanced by
    /// calling their `next` member.
    pub fn iterate_next(&mut self, iterator: Value) -> RunResult<Value> {
        let (native, generator) = match self.heap.data(iterator) {
            ObjectData::Iterator(_) => (true, false),
            ObjectData::Generator(_) => (false, true),
            _ => (false, false),
        };
        if native {
            self.native_next(iterator)
        } else if generator {
            self.generator_next(iterator)
        } else {
            let next = self.get_member(iterator, "next")?;
            self.call_value(next, Vec::new())
        }
    }

    /// Drains an iterable into a vector.
    ///
    /// The iterator and the items drained so far stay pinned while it runs.
    pub fn collect_iterable(&mut self, iterable: Value) -> RunResult<Vec<Value>> {
        let iterator = self.get_iterator(iterable)?;
        let mark = self.pin(&[iterator]);
        let mut items = Vec::new();
        let result = loop {
            match self.iterate_next(iterator) {
                Ok(item) => {
                    self.roots.push(item);
                    items.push(item);
                }
                Err(RunError::Exc(err)) if self.error_is(&err, ExcType::IteratorStopped) => break Ok(items),
                Err(err) => break Err(err),
            }
        };
        self.unpin(mark);
        result
    }

    /// Steps a native iterator. Containers are re-read on every step.
    pub fn native_next(&mut self, iterator: Value) -> RunResult<Value> {
        let ObjectData::Iterator(state) = self.heap.data(iterator) else {
            return Err(self.heap.unexpected("iterator", iterator));
        };
        let (item, advanced) = match state.clone() {
            NativeIter::List { list, index } => {
                let ObjectData::List(items) = self.heap.data(list) else {
                    return Err(self.heap.unexpected("list", list));
                };
                let Some(&item) = items.get(index) else {
                    return Err(stopped());
                };
                (item, NativeIter::List { list, index: index + 1 })
            }
            NativeIter::Str { string, offset } => {
                let text = self.heap.as_str(string).ok_or_else(|| self.heap.unexpected("string", string))?;
                let Some(ch) = text.get(offset..).and_then(|rest| rest.chars().next()) else {
                    return Err(stopped());
                };
                let item = self.heap.string(ch.to_string())?;
                (
                    item,
                    NativeIter::Str {
                        string,
                        offset: offset + ch.len_utf8(),
                    },
                )
            }
            NativeIter::Range { next, stop, step } => {
                let more = if step > 0 { next < stop } else { next > stop };
                if !more {
                    return Err(stopped());
                }
                let item = self.heap.int(next)?;
                let next = next.checked_add(step).unwrap_or(stop);
                (item, NativeIter::Range { next, stop, step })
            }
            NativeIter::MapKeys { map, index } => {
                let ObjectData::Map(entries) = self.heap.data(map) else {
                    return Err(self.heap.unexpected("map", map));
                };
                let Some(key) = entries.key_at(index) else {
                    return Err(stopped());
                };
                (key, NativeIter::MapKeys { map, index: index + 1 })
            }
        };
        if let ObjectData::Iterator(state) = &mut self.heap.get_mut(iterator).data {
            *state = advanced;
        }
        Ok(item)
    }

    /// Resumes a generator until its next yield.
    ///
    /// The generator's frame is taken out while it runs, so a re-entrant
    /// `next` fails instead of resuming it twice. Completion or an error
    /// finishes the generator; every later call raises `IteratorStopped`.
    pub fn generator_next(&mut self, generator: Value) -> RunResult<Value> {
        let ObjectData::Generator(state) = &mut self.heap.get_mut(generator).data else {
            return Err(RunError::internal("generator_next called on a non-generator"));
        };
        match state.state {
            GeneratorState::Running => {
                return Err(ExcType::ValueError.msg(format!("generator '{}' is already running", state.name)));
            }
            GeneratorState::Finished => return Err(stopped()),
            GeneratorState::New | GeneratorState::Suspended => {}
        }
        let Some(mut frame) = state.frame.take() else {
            return Err(RunError::internal("suspended generator has no frame"));
        };
        let previous = state.state;
        let name = state.name.clone();
        state.state = GeneratorState::Running;

        if let Err(err) = self.enter_frame() {
            self.restore_generator(generator, Some(frame), previous);
            return Err(err);
        }
        self.tracer.on_generator_resume(self.depth);
        let result = self.run_frame(&mut frame);
        self.leave_frame();

        match result {
            Ok(Completion::Yield(value)) => {
                self.tracer.on_generator_suspend(self.depth);
                self.restore_generator(generator, Some(frame), GeneratorState::Suspended);
                Ok(value)
            }
            Ok(Completion::Done(_)) => {
                self.restore_generator(generator, None, GeneratorState::Finished);
                Err(stopped())
            }
            Err(err) => {
                self.restore_generator(generator, None, GeneratorState::Finished);
                Err(err.with_layer(&name, &[]))
            }
        }
    }

    fn restore_generator(&mut self, generator: Value, frame: Option<Box<Frame>>, new_state: GeneratorState) {
        if let ObjectData::Generator(state) = &mut self.heap.get_mut(generator).data {
            state.frame = frame;
            state.state = new_state;
        }
    }
}
