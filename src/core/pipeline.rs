use async_trait::async_trait;

/// A unit of async work within a [`Pipeline`]. Tasks receive a shared
/// context and communicate through it via interior mutability.
#[async_trait]
pub trait AsyncTask<C, E>: Send + Sync {
    async fn run(&self, context: &C) -> Result<(), E>;
}

/// A unit of cheap, non-suspending work within a [`Pipeline`]. Anything
/// that touches the network or a lock that may be held across an await
/// belongs in an [`AsyncTask`] instead.
pub trait BlockingTask<C, E>: Send + Sync {
    fn run(&self, context: &C) -> Result<(), E>;
}

enum Stage<C, E> {
    Async(Box<dyn AsyncTask<C, E>>),
    Blocking(Box<dyn BlockingTask<C, E>>),
}

/// An ordered list of tasks run against a shared context. The first task
/// to return an error aborts the remainder; the error is handed back to
/// the caller, which decides whether follow-up pipelines still run.
pub struct Pipeline<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C: Sync, E> Pipeline<C, E> {
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for stage in &self.stages {
            match stage {
                Stage::Async(task) => task.run(context).await?,
                Stage::Blocking(task) => task.run(context)?,
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

pub struct PipelineBuilder<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> PipelineBuilder<C, E> {
    pub fn new() -> Self {
        PipelineBuilder { stages: Vec::new() }
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E>>) -> Self {
        self.stages.push(Stage::Async(task));
        self
    }

    pub fn with_blocking(mut self, task: Box<dyn BlockingTask<C, E>>) -> Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E>>) {
        self.stages.push(Stage::Async(task));
    }

    pub fn add_blocking(&mut self, task: Box<dyn BlockingTask<C, E>>) {
        self.stages.push(Stage::Blocking(task));
    }

    /// Returns `None` when no tasks were added, so optional pipelines
    /// (e.g. finalizers in a bare dev setup) collapse away cleanly.
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.stages.is_empty() {
            return None;
        }

        Some(Pipeline {
            stages: self.stages,
        })
    }
}

impl<C, E> Default for PipelineBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}
